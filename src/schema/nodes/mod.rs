//! The fixed node library (component C4): scalars, objects, arrays, keyed
//! lists, encoding adapters, and references. Redaction and stub/hidden
//! passthrough are thin enough that they live as `Schema` variants handled
//! directly in `schema::kernel` rather than getting their own module.

pub mod array;
pub mod encoding;
pub mod keyed_list;
pub mod object;
pub mod reference;
pub mod scalar;
