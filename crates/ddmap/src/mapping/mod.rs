//! Declarative field mapping between configuration trees and JSON payloads.

pub mod codec;
pub mod field_spec;
pub mod path;
pub mod schema;
pub mod union;
pub mod validation;

pub use codec::{build, canonicalize, flatten, flatten_with_prior, Advisory, BuildContext, Prior};
pub use field_spec::{Discriminator, FieldSpec, FieldType, WidgetSpec};
pub use schema::{derive, SchemaNode, SchemaType, ScalarType};
pub use union::UnionRegistry;
pub use validation::{check_closure, into_result, Diagnostic, FieldValidator};
