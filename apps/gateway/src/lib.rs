//! 网关应用层：命令分发与行式控制台。

pub mod commands;
pub mod console;
