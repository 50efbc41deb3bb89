pub mod bytes;
pub mod decode;
pub mod record;
pub mod template;

pub use decode::{datagram, Error};
pub use record::FlowRecord;
pub use template::{FieldSpec, Template, TemplateTable};
