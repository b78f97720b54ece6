mod model_loaders;

pub use model_loaders::{load_comment_middleware, load_task_middleware};
