//! Ports - 差し替え可能な外部依存
//!
//! 時刻と ID 生成だけを trait にしている。テストでは FixedClock を使う。

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
