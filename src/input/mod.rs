pub mod color;
pub mod events;
pub mod pointer;

pub use color::{generate_color, hsv_to_rgb, ColorRgb};
pub use events::{InputEvent, InputHub, InputSource, InputSubscription, PointerId, SubscriptionId};
pub use pointer::{Pointer, PointerTracker, SplatKind, SplatRequest, MOUSE_POINTER_ID};
