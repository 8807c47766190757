// pool.rs - 后台工作线程池
//! 固定数量的工作线程 + 有界任务队列
//!
//! 队列满时 `submit` 阻塞，调用方由此获得背压；池关闭后提交会失败。
//! 异步操作的回调通过 [`Completion`] 保证恰好调用一次。

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 线程池错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    ShutDown,

    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// 有界工作线程池
pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 创建线程池；`size` 和 `queue_capacity` 至少为 1
    pub fn new(size: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("media-worker-{id}"))
                .spawn(move || worker_loop(id, receiver))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            workers.push(handle);
        }
        debug!("[Pool] 启动 {} 个工作线程", size);

        Ok(Self { sender: Some(sender), workers })
    }

    /// 提交任务；队列满时阻塞
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        sender.send(Box::new(job)).map_err(|_| PoolError::ShutDown)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// 停止接收新任务，执行完已排队的任务后回收线程
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("[Pool] 工作线程异常退出");
            }
        }
        debug!("[Pool] 已关闭");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let guard = match receiver.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.recv()
        };
        match job {
            Ok(job) => {
                // 单个任务 panic 不影响线程继续工作
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!("[Pool] worker {} 任务 panic", id);
                }
            }
            Err(_) => break,
        }
    }
}

/// 异步操作的结果回调
pub type Callback<T> = Box<dyn FnOnce(Result<T, String>) + Send + 'static>;

/// 回调包装：`complete` 调用一次；未完成就被丢弃时（任务被拒绝、
/// 任务 panic）以错误调用回调。
pub struct Completion<T> {
    callback: Option<Callback<T>>,
}

impl<T> Completion<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T, String>) + Send + 'static,
    {
        Self { callback: Some(Box::new(callback)) }
    }

    pub fn complete(mut self, result: Result<T, String>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Err("operation was abandoned before completion".to_string()));
        }
    }
}
