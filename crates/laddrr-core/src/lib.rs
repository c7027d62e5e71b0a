pub mod config;
pub mod error;
pub mod feedback;
pub mod flow;
pub mod flows;
pub mod history;
pub mod io;
pub mod paths;
pub mod schema;
pub mod store;
pub mod surveys;
pub mod template;

pub use error::{BoxError, LaddrrError, Result};
pub use flow::{CallPolicy, CompletionRequest, CompletionService, FlowSpec, Pipeline, ScriptedCompletion};
pub use store::{Record, Store};
