pub mod document;
pub mod member_feed;
pub mod member_store;
pub mod reservation_store;

pub use member_feed::MemberSubscription;
pub use member_store::{
    create_shared_member_store, FileMemberStore, Member, MemberStore, MemberUpdate,
    SharedMemberStore,
};
pub use reservation_store::{
    create_shared_reservation_store, BookingDuration, FileReservationStore, Reservation,
    ReservationQuery, ReservationStore, SharedReservationStore,
};
