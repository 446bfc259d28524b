pub use crate::{
    Action, ClientConfig, ClientError, EventKind, HttpWorkflowApi, LogEvent, Renderer,
    TextRenderer, ViewController, ViewState, WorkflowApi, render_view,
};
