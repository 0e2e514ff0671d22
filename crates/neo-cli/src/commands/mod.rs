//! CLI 명령어 구현 모듈.

pub mod backend;
pub mod stream;
