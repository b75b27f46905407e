//! Reusable UI components shared by the monitor dashboard and the slot editor

pub mod frame_view;
pub mod status_card;

pub use frame_view::{frame_to_color_image, paint_slot, show_frame, update_texture, FrameTransform};
pub use status_card::{CardStatus, StatusCard};
