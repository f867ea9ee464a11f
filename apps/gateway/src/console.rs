//! 行式 JSON 控制台
//!
//! 每行一条命令，每行一条响应；被选中设备的实时数据以
//! `{"status": "data", "data": {...}}` 帧穿插输出。输入结束视为客户端断开。

use crate::commands::{CommandHandler, stream_frame};
use gw_pipeline::EventQueue;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// 流队列为空时的轮询间隔
pub const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 逐行处理命令直到输入结束
pub async fn serve_lines<R, W>(handler: &CommandHandler, input: R, out: &Mutex<W>) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = handler.handle_text(line).await;
        write_json(out, &response).await?;
    }
    handler.on_disconnect().await;
    Ok(())
}

/// 持续取出流队列中的记录并输出
pub async fn pump_stream<W>(queue: Arc<EventQueue>, out: Arc<Mutex<W>>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match queue.dequeue_stream().await {
            Some(record) => write_json(&out, &stream_frame(&record)).await?,
            // 队列排空后才等待下一轮
            None => tokio::time::sleep(STREAM_POLL_INTERVAL).await,
        }
    }
}

async fn write_json<W>(out: &Mutex<W>, value: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value).map_err(io::Error::other)?;
    line.push(b'\n');
    let mut out = out.lock().await;
    out.write_all(&line).await?;
    out.flush().await
}
