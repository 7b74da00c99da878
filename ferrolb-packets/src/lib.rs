mod types;
pub use self::types::*;

mod arp;
pub use self::arp::*;

mod ndp;
pub use self::ndp::*;
