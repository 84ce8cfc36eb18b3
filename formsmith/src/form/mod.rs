//! Form renderer: turns a configuration document into an editable record form.

pub mod layout;
pub mod session;
pub mod validation;
pub mod value;
pub mod widget;

pub use layout::{FormRow, group_rows};
pub use session::{FormError, FormLayout, FormMode, FormSession, FormState};
pub use validation::{ValidationError, validate};
pub use value::{DataKind, TypedValue};
pub use widget::{RenderedField, TextHint, Widget};
