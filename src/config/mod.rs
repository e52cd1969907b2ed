pub mod club;

pub use club::ClubConfig;
