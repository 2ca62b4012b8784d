//! Pipeline graph model, construction, and admission validation.
//!
//! - [`Graph`], [`Node`], [`Edge`]: the client-submitted structure
//! - [`GraphBuilder`]: fluent in-code construction
//! - [`Validator`]: the structural admission gate run at submission

mod builder;
mod model;
mod validator;

pub use builder::GraphBuilder;
pub use model::{Edge, Graph, Node, NodeConfigError};
pub use validator::{ValidationError, Validator};
