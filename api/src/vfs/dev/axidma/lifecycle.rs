//! AXI DMA 模块生命周期
//!
//! 启动分两步：先初始化 DMA 子系统，再初始化依赖它的字符设备子系统。
//! 每完成一步就在回滚栈上记录一项，失败时按相反顺序撤销已完成的步骤；
//! 卸载时同样按栈逆序释放，字符设备总是先于 DMA 退出。

use alloc::vec::Vec;

use super::{
    chrdev::ChrdevSubsystem,
    dma::DmaSubsystem,
    error::{AxidmaError, AxidmaResult},
    param::AxidmaParams,
    types::{AxidmaDevice, DevState},
};

/// 已完成、需要撤销的启动步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Dma,
    Chrdev,
}

/// AXI DMA 模块
///
/// 持有设备状态记录和两个子系统。每次加载只允许启动一次。
pub struct AxidmaModule<D, C>
where
    D: DmaSubsystem,
    C: ChrdevSubsystem<Dma = D::Handle>,
{
    dev: AxidmaDevice<D::Handle, C::Handle>,
    dma: D,
    chrdev: C,
    undo: Vec<Stage>,
    started: bool,
}

impl<D, C> AxidmaModule<D, C>
where
    D: DmaSubsystem,
    C: ChrdevSubsystem<Dma = D::Handle>,
{
    pub fn new(params: &AxidmaParams, dma: D, chrdev: C) -> Self {
        Self {
            dev: AxidmaDevice::new(params),
            dma,
            chrdev,
            undo: Vec::with_capacity(2),
            started: false,
        }
    }

    /// 设备状态记录
    pub fn device(&self) -> &AxidmaDevice<D::Handle, C::Handle> {
        &self.dev
    }

    pub fn state(&self) -> DevState {
        self.dev.state()
    }

    /// 启动模块
    ///
    /// 成功后两个句柄均已就绪；失败时已完成的步骤全部撤销，记录中不保留
    /// 任何句柄，调用者无需也不应再调用 [`stop`](Self::stop)。
    pub fn start(&mut self) -> AxidmaResult<()> {
        if self.started {
            warn!("axidma: bring-up already attempted in this lifetime");
            return Err(AxidmaError::AlreadyStarted);
        }
        self.started = true;

        let dma_config = self.dev.dma_config();
        debug!("axidma: initializing DMA with {:?}", dma_config);
        let handle = self.dma.init(&dma_config).map_err(|e| {
            error!("axidma: DMA init failed: {}", e);
            AxidmaError::DmaInitFailed(e)
        })?;
        self.undo.push(Stage::Dma);

        let chrdev_config = self.dev.chrdev_config();
        let dma = self.dev.install_dma(handle);
        let result = self.chrdev.init(&chrdev_config, dma);

        match result {
            Ok(handle) => {
                self.dev.install_chrdev(handle);
                self.undo.push(Stage::Chrdev);
                self.dev.set_state(DevState::Operational);
                info!(
                    "axidma: module loaded, /dev/{} ready",
                    self.dev.chrdev_name()
                );
                Ok(())
            }
            Err(e) => {
                error!("axidma: chrdev init failed: {}, rolling back", e);
                self.dev.set_state(DevState::RollingBack);
                self.unwind();
                self.dev.set_state(DevState::Unloaded);
                Err(AxidmaError::InterfaceInitFailed(e))
            }
        }
    }

    /// 卸载模块
    ///
    /// 只在 [`start`](Self::start) 成功后生效，其他状态下什么也不做。
    pub fn stop(&mut self) {
        if self.dev.state() != DevState::Operational {
            debug!(
                "axidma: stop in state {:?}, nothing to release",
                self.dev.state()
            );
            return;
        }
        self.dev.set_state(DevState::TearingDown);
        self.unwind();
        self.dev.set_state(DevState::Unloaded);
        info!("axidma: module unloaded");
    }

    /// 按逆序撤销已完成的步骤
    fn unwind(&mut self) {
        while let Some(stage) = self.undo.pop() {
            match stage {
                Stage::Chrdev => {
                    if let Some(handle) = self.dev.take_chrdev() {
                        self.chrdev.exit(handle);
                    }
                }
                Stage::Dma => {
                    if let Some(handle) = self.dev.take_dma() {
                        self.dma.exit(handle);
                    }
                }
            }
        }
        debug_assert!(self.dev.is_empty());
    }
}

impl<D, C> Drop for AxidmaModule<D, C>
where
    D: DmaSubsystem,
    C: ChrdevSubsystem<Dma = D::Handle>,
{
    fn drop(&mut self) {
        if self.dev.state() == DevState::Operational {
            warn!("axidma: module dropped while operational, tearing down");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, vec};
    use core::cell::RefCell;

    use super::*;
    use crate::vfs::dev::axidma::{
        chrdev::ChrdevConfig,
        dma::DmaConfig,
        error::{ChrdevError, ChrdevResult, DmaError, DmaResult},
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        DmaInit,
        DmaExit(u32),
        ChrdevInit(u32),
        ChrdevExit(u32),
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    struct FakeDma {
        log: Log,
        fail: Option<DmaError>,
    }

    impl DmaSubsystem for FakeDma {
        type Handle = u32;

        fn init(&mut self, _config: &DmaConfig) -> DmaResult<u32> {
            self.log.borrow_mut().push(Call::DmaInit);
            match self.fail {
                Some(e) => Err(e),
                None => Ok(7),
            }
        }

        fn exit(&mut self, handle: u32) {
            self.log.borrow_mut().push(Call::DmaExit(handle));
        }
    }

    struct FakeChrdev {
        log: Log,
        fail: Option<ChrdevError>,
        seen: Option<ChrdevConfig>,
    }

    impl ChrdevSubsystem for FakeChrdev {
        type Dma = u32;
        type Handle = u32;

        fn init(&mut self, config: &ChrdevConfig, dma: &u32) -> ChrdevResult<u32> {
            self.log.borrow_mut().push(Call::ChrdevInit(*dma));
            self.seen = Some(config.clone());
            match self.fail {
                Some(e) => Err(e),
                None => Ok(*dma + 1),
            }
        }

        fn exit(&mut self, handle: u32) {
            self.log.borrow_mut().push(Call::ChrdevExit(handle));
        }
    }

    fn module(
        dma_fail: Option<DmaError>,
        chrdev_fail: Option<ChrdevError>,
    ) -> (AxidmaModule<FakeDma, FakeChrdev>, Log) {
        let log = Log::default();
        let dma = FakeDma {
            log: log.clone(),
            fail: dma_fail,
        };
        let chrdev = FakeChrdev {
            log: log.clone(),
            fail: chrdev_fail,
            seen: None,
        };
        (AxidmaModule::new(&AxidmaParams::default(), dma, chrdev), log)
    }

    #[test]
    fn successful_start_is_operational() {
        let (mut module, log) = module(None, None);
        assert_eq!(module.start(), Ok(()));
        assert_eq!(module.state(), DevState::Operational);
        assert_eq!(module.device().dma(), Some(&7));
        assert_eq!(module.device().chrdev(), Some(&8));
        assert_eq!(*log.borrow(), vec![Call::DmaInit, Call::ChrdevInit(7)]);

        let seen = module.chrdev.seen.clone().unwrap();
        assert_eq!(seen.name, "axidma");
        assert_eq!(seen.minor_num, 0);
        assert_eq!(seen.num_devices, 1);
        assert_eq!(
            module.device().transitions(),
            [DevState::DmaReady, DevState::Operational]
        );
    }

    #[test]
    fn dma_failure_skips_chrdev() {
        let (mut module, log) = module(Some(DmaError::RegionUnavailable), None);
        let err = module.start().unwrap_err();
        assert_eq!(err, AxidmaError::DmaInitFailed(DmaError::RegionUnavailable));
        assert_eq!(
            alloc::format!("{}", DmaError::RegionUnavailable),
            "region unavailable",
        );
        assert!(module.device().is_empty());
        assert_eq!(module.state(), DevState::Unloaded);
        assert_eq!(*log.borrow(), vec![Call::DmaInit]);
        assert!(module.device().transitions().is_empty());
    }

    #[test]
    fn chrdev_failure_rolls_back_dma() {
        let (mut module, log) = module(None, Some(ChrdevError::NameInUse));
        let err = module.start().unwrap_err();
        assert_eq!(
            err,
            AxidmaError::InterfaceInitFailed(ChrdevError::NameInUse),
        );
        assert!(module.device().is_empty());
        assert_eq!(module.state(), DevState::Unloaded);
        assert_eq!(
            *log.borrow(),
            vec![Call::DmaInit, Call::ChrdevInit(7), Call::DmaExit(7)]
        );
        assert_eq!(
            module.device().transitions(),
            [DevState::DmaReady, DevState::RollingBack, DevState::Unloaded]
        );

        // 失败后 stop 不会再次释放 DMA
        module.stop();
        let exits = log
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::DmaExit(_)))
            .count();
        assert_eq!(exits, 1);
    }

    #[test]
    fn stop_releases_chrdev_before_dma() {
        let (mut module, log) = module(None, None);
        module.start().unwrap();
        log.borrow_mut().clear();

        module.stop();
        assert_eq!(*log.borrow(), vec![Call::ChrdevExit(8), Call::DmaExit(7)]);
        assert!(module.device().is_empty());
        assert_eq!(module.state(), DevState::Unloaded);
        assert_eq!(
            module.device().transitions(),
            [
                DevState::DmaReady,
                DevState::Operational,
                DevState::TearingDown,
                DevState::Unloaded,
            ]
        );
    }

    #[test]
    fn start_only_once_per_lifetime() {
        let (mut module, log) = module(None, None);
        module.start().unwrap();
        assert_eq!(module.start(), Err(AxidmaError::AlreadyStarted));
        module.stop();
        assert_eq!(module.start(), Err(AxidmaError::AlreadyStarted));
        assert_eq!(
            log.borrow()
                .iter()
                .filter(|call| **call == Call::DmaInit)
                .count(),
            1
        );

        let (mut failed, _) = module_with_dma_failure();
        assert!(failed.start().is_err());
        assert_eq!(failed.start(), Err(AxidmaError::AlreadyStarted));
    }

    fn module_with_dma_failure() -> (AxidmaModule<FakeDma, FakeChrdev>, Log) {
        module(Some(DmaError::NoChannels), None)
    }

    #[test]
    fn stop_before_start_is_noop() {
        let (mut module, log) = module(None, None);
        module.stop();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn drop_tears_down_operational_module() {
        let (mut module, log) = module(None, None);
        module.start().unwrap();
        drop(module);
        assert_eq!(log.borrow()[2..], [Call::ChrdevExit(8), Call::DmaExit(7)]);
    }
}
