//! Expression compilation.
//!
//! Callers describe conditions, updates and projections as typed values. The
//! pipeline is:
//!
//! 1. **Parsing**: attribute path strings become [`PathElement`] sequences.
//! 2. **Serialization**: each expression kind is rendered with its own
//!    placeholder prefix, producing text plus name/value maps.
//! 3. **Optimization**: all expressions of one request are merged into an
//!    [`ExpressionBundle`] whose placeholders are deduplicated and compacted.

pub mod compiled;
pub mod condition;
pub mod optimizer;
pub mod path;
pub mod placeholder;
pub mod projection;
pub mod update;

pub use compiled::{CompiledExpression, ExpressionBundle, ExpressionKind, ExpressionSerializer};
pub use condition::{AttributeType, CompareOp, Condition, Operand, compile_condition};
pub use optimizer::optimize;
pub use path::{AttributePath, PathElement, parse};
pub use placeholder::PlaceholderGenerator;
pub use projection::compile_projection;
pub use update::{UpdateOperation, Updates, compile_update};
