pub mod booking_manager;
pub mod member_manager;

pub use booking_manager::{create_shared_booking_manager, SharedBookingManager};
pub use member_manager::{create_shared_member_manager, SharedMemberManager};
