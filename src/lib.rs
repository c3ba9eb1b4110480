//! AXI DMA 驱动模块入口
//!
//! 宿主在加载时调用 [`axidma_init`]，卸载时调用 [`axidma_exit`]，每次加载
//! 各调用一次。加载成功后 `/dev/axidma` 可用，用户态可以通过它在处理器与
//! 可编程逻辑之间传输数据。

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
extern crate alloc;

use alloc::{string::String, sync::Arc};

use axerrno::AxResult;
use spin::Mutex;
pub use starry_axidma_api::vfs::dev::{
    DevRegistry,
    axidma::{
        AxiDmaChrdev, AxiDmaEngine, AxidmaDevice, AxidmaError, AxidmaModule, AxidmaParams,
        AxidmaResult, ChrdevHandle, ChrdevHost, DevState, DmaHandle, DmaPlatform, ParamError,
        StaticCmaPlatform,
    },
};

/// 模块信息
#[derive(Debug, Clone, Copy)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const MODULE_INFO: ModuleInfo = ModuleInfo {
    name: "axidma",
    description: "Module to provide a userspace interface for transferring \
                  data from the processor to the logic fabric via AXI DMA.",
};

/// 使用 AXI DMA 引擎和字符设备的模块实例
pub type AxidmaDriver = AxidmaModule<AxiDmaEngine, AxiDmaChrdev>;

struct LoadedModule {
    params: AxidmaParams,
    driver: AxidmaDriver,
}

/// 已加载模块的存放位置
///
/// 保证同一时刻最多只有一个已加载的实例，加载失败时不保留任何状态。
pub struct ModuleSlot {
    inner: Mutex<Option<LoadedModule>>,
}

impl ModuleSlot {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// 解析参数并启动模块
    pub fn load(
        &self,
        args: &str,
        platform: Arc<dyn DmaPlatform>,
        host: Arc<dyn ChrdevHost>,
    ) -> AxidmaResult<()> {
        let mut slot = self.inner.lock();
        if slot.is_some() {
            warn!("{}: module already loaded", MODULE_INFO.name);
            return Err(AxidmaError::AlreadyLoaded);
        }

        let params = AxidmaParams::parse(args).inspect_err(|e| {
            error!("{}: {}", MODULE_INFO.name, e);
        })?;
        let mut driver = AxidmaModule::new(
            &params,
            AxiDmaEngine::new(platform),
            AxiDmaChrdev::new(host),
        );
        driver.start()?;

        *slot = Some(LoadedModule { params, driver });
        Ok(())
    }

    /// 同 [`load`](Self::load)，错误转换为 [`AxError`](axerrno::AxError)
    pub fn load_ax(
        &self,
        args: &str,
        platform: Arc<dyn DmaPlatform>,
        host: Arc<dyn ChrdevHost>,
    ) -> AxResult {
        Ok(self.load(args, platform, host)?)
    }

    /// 卸载模块，未加载时什么也不做
    pub fn unload(&self) {
        let loaded = self.inner.lock().take();
        match loaded {
            Some(mut loaded) => loaded.driver.stop(),
            None => warn!("{}: unload without a loaded module", MODULE_INFO.name),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// 读取模块参数的当前值，未加载时返回 `None`
    pub fn param(&self, name: &str) -> Option<Result<String, ParamError>> {
        self.inner
            .lock()
            .as_ref()
            .map(|loaded| loaded.params.get(name))
    }

    /// 运行时修改模块参数
    pub fn set_param(&self, name: &str, value: &str) -> Result<(), ParamError> {
        let mut slot = self.inner.lock();
        match slot.as_mut() {
            Some(loaded) => loaded.params.store(name, value),
            None => Err(ParamError::Unknown(String::from(name))),
        }
    }

    /// 访问已加载模块的设备状态记录
    pub fn with_device<R>(
        &self,
        f: impl FnOnce(&AxidmaDevice<DmaHandle, ChrdevHandle>) -> R,
    ) -> Option<R> {
        self.inner
            .lock()
            .as_ref()
            .map(|loaded| f(loaded.driver.device()))
    }
}

impl Default for ModuleSlot {
    fn default() -> Self {
        Self::new()
    }
}

static AXIDMA_MODULE: ModuleSlot = ModuleSlot::new();

/// 模块加载钩子，成功返回 0，失败返回负的 errno
pub fn axidma_init(args: &str, platform: Arc<dyn DmaPlatform>, host: Arc<dyn ChrdevHost>) -> i32 {
    match AXIDMA_MODULE.load(args, platform, host) {
        Ok(()) => 0,
        Err(e) => {
            error!("{}: load failed: {}", MODULE_INFO.name, e);
            e.as_errno()
        }
    }
}

/// 模块卸载钩子
pub fn axidma_exit() {
    AXIDMA_MODULE.unload();
}

/// 全局模块实例
pub fn axidma_module() -> &'static ModuleSlot {
    &AXIDMA_MODULE
}
