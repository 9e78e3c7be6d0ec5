//! 重量级模型资源的惰性加载与空闲卸载
//!
//! 加载路径是唯一的互斥点：并发调用方阻塞在同一把锁上等待同一次加载，
//! 不会各自触发重复加载。每次使用都会把空闲截止时间向后推，
//! 已排定的卸载任务通过世代号失效，不会与晚于它开始的使用并发执行。
//! 调用方拿到的是 `Arc<T>` 句柄，即使空闲卸载先一步发生，
//! 句柄在本次使用期间仍然有效，实例在最后一个持有者释放后才真正回收。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::metrics;

type LoadFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

struct Slot<T> {
    resource: Option<Arc<T>>,
    /// 每次使用递增，用于让过期的卸载任务失效
    generation: u64,
    unload_task: Option<JoinHandle<()>>,
}

/// 零或一个已加载实例的所有权、空闲截止时间与互斥保护
pub struct ResourceManager<T: Send + Sync + 'static> {
    slot: Mutex<Slot<T>>,
    idle_timeout: Duration,
    load: LoadFn<T>,
}

impl<T: Send + Sync + 'static> ResourceManager<T> {
    pub fn new<F>(idle_timeout: Duration, load: F) -> Arc<Self>
    where
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            slot: Mutex::new(Slot { resource: None, generation: 0, unload_task: None }),
            idle_timeout,
            load: Box::new(load),
        })
    }

    /// 获取共享实例，未加载时触发一次加载
    ///
    /// 加载期间持有锁，后续调用方在锁上排队等待同一次加载完成
    pub async fn acquire(self: &Arc<Self>) -> Result<Arc<T>> {
        let mut slot = self.slot.lock().await;

        let handle = match slot.resource.clone() {
            Some(handle) => handle,
            None => {
                info!("正在加载模型资源");
                let resource = Arc::new((self.load)().await?);
                slot.resource = Some(resource.clone());
                metrics::inc_model_load();
                resource
            }
        };

        slot.generation += 1;
        let generation = slot.generation;
        if let Some(task) = slot.unload_task.take() {
            task.abort();
        }
        slot.unload_task = Some(self.schedule_unload(generation));

        Ok(handle)
    }

    /// 排定一次空闲卸载，到期时世代号不一致则说明期间有新的使用，放弃卸载
    fn schedule_unload(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            let mut slot = manager.slot.lock().await;
            if slot.generation != generation {
                return;
            }
            if slot.resource.take().is_some() {
                info!("模型资源空闲超时，已卸载");
                metrics::inc_model_unload();
            }
            slot.unload_task = None;
        })
    }

    /// 当前是否处于已加载状态
    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.resource.is_some()
    }
}
