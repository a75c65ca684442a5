//! Tool sources and schema rendering
//!
//! Every source produces [`ToolDescriptor`](relay_application::ToolDescriptor)s
//! through the [`ToolProvider`](relay_application::ToolProvider) port:
//!
//! | Provider | Priority | Backing |
//! |----------|----------|---------|
//! | [`FunctionToolProvider`] | 100 | in-process async closures |
//! | [`CommandToolProvider`] | 75 | `sh -c` command templates |
//! | [`RemoteToolProvider`] | 50 | request/response over a [`ToolTransport`] |

pub mod command;
pub mod function;
pub mod remote;
pub mod schema;

pub use command::{COMMAND_PRIORITY, CommandTool, CommandToolProvider};
pub use function::{FUNCTION_PRIORITY, FunctionTool, FunctionToolProvider, builtin_provider};
pub use remote::{
    LoopbackTransport, REMOTE_PRIORITY, RemoteRequest, RemoteResponse, RemoteToolProvider,
    ToolTransport, TransportError,
};
pub use schema::JsonSchemaToolConverter;
