//! 세션 전반에서 사용되는 공통 타입.

mod endpoint;
mod scrip;

pub use endpoint::*;
pub use scrip::*;
