pub mod images;
pub mod orders;
pub mod rates;
pub mod referrals;
pub mod users;
