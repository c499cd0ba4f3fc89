pub mod config_tree;
pub mod error;
pub mod kinds;
pub mod logging;
pub mod mapping;
pub mod reconciler;
pub mod settings;

pub use config_tree::{ConfigAccessor, ConfigTree, StateWriter};
pub use error::{classify_status, EngineError, Result};
pub use kinds::{Capabilities, KindHandler, KindRegistry, ResourceKind};
pub use logging::init_logging;
pub use mapping::{Advisory, BuildContext, Diagnostic, FieldSpec, FieldType, SchemaNode};
pub use reconciler::clock::{Clock, ManualClock, TokioClock};
pub use reconciler::http::{HttpClient, HttpResponse, ReqwestClient};
pub use reconciler::plan::Plan;
pub use reconciler::{Applied, ReadStatus, Reconciler};
pub use settings::EngineSettings;
