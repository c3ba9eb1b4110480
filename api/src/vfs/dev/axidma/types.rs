//! AXI DMA 设备状态

use alloc::string::String;
#[cfg(test)]
use alloc::vec::Vec;

use super::{NUM_DEVICES, chrdev::ChrdevConfig, dma::DmaConfig, param::AxidmaParams};

/// 字符设备号，编码方式与 Linux `MKDEV` 相同
///
/// 高 12 位为主设备号，低 20 位为次设备号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevId(u32);

impl DevId {
    pub const MINOR_BITS: u32 = 20;
    pub const MINOR_MASK: u32 = (1 << Self::MINOR_BITS) - 1;

    pub const fn new(major: u32, minor: u32) -> Self {
        Self((major << Self::MINOR_BITS) | (minor & Self::MINOR_MASK))
    }

    pub const fn major(self) -> u32 {
        self.0 >> Self::MINOR_BITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & Self::MINOR_MASK
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// 设备生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevState {
    /// 未加载，不持有任何句柄
    Unloaded,
    /// DMA 子系统已就绪，字符设备尚未注册
    DmaReady,
    /// 两个子系统均已就绪
    Operational,
    /// 启动失败，正在释放已完成的步骤
    RollingBack,
    /// 正在卸载
    TearingDown,
}

/// 设备状态记录
///
/// 配置字段在构造时确定，之后只读；两个句柄槽由 [`AxidmaModule`] 在启动
/// 和卸载时填充与清空。
///
/// [`AxidmaModule`]: super::AxidmaModule
pub struct AxidmaDevice<D, C> {
    /// 板载物理内存大小
    mem_size: usize,
    /// CMA 区域大小
    cma_len: usize,
    chrdev_name: String,
    minor_num: i32,
    num_devices: u32,
    state: DevState,
    dma: Option<D>,
    chrdev: Option<C>,
    #[cfg(test)]
    transitions: Vec<DevState>,
}

impl<D, C> AxidmaDevice<D, C> {
    /// 用模块参数创建空的设备记录
    pub fn new(params: &AxidmaParams) -> Self {
        Self {
            mem_size: params.max_phys_mem,
            cma_len: params.cma_region_size,
            chrdev_name: params.chrdev_name.clone(),
            minor_num: params.minor_num,
            num_devices: NUM_DEVICES,
            state: DevState::Unloaded,
            dma: None,
            chrdev: None,
            #[cfg(test)]
            transitions: Vec::new(),
        }
    }

    pub fn mem_size(&self) -> usize {
        self.mem_size
    }

    pub fn cma_len(&self) -> usize {
        self.cma_len
    }

    pub fn chrdev_name(&self) -> &str {
        &self.chrdev_name
    }

    pub fn minor_num(&self) -> i32 {
        self.minor_num
    }

    pub fn num_devices(&self) -> u32 {
        self.num_devices
    }

    pub fn state(&self) -> DevState {
        self.state
    }

    /// DMA 子系统句柄
    pub fn dma(&self) -> Option<&D> {
        self.dma.as_ref()
    }

    /// 字符设备子系统句柄
    pub fn chrdev(&self) -> Option<&C> {
        self.chrdev.as_ref()
    }

    /// 是否未持有任何句柄
    pub fn is_empty(&self) -> bool {
        self.dma.is_none() && self.chrdev.is_none()
    }

    /// 交给 DMA 子系统的配置
    pub fn dma_config(&self) -> DmaConfig {
        DmaConfig {
            mem_size: self.mem_size,
            cma_len: self.cma_len,
        }
    }

    /// 交给字符设备子系统的配置
    pub fn chrdev_config(&self) -> ChrdevConfig {
        ChrdevConfig {
            name: self.chrdev_name.clone(),
            minor_num: self.minor_num,
            num_devices: self.num_devices,
        }
    }

    pub(super) fn set_state(&mut self, state: DevState) {
        debug!("axidma: {:?} -> {:?}", self.state, state);
        self.state = state;
        #[cfg(test)]
        self.transitions.push(state);
    }

    /// 构造以来经过的全部状态
    #[cfg(test)]
    pub(super) fn transitions(&self) -> &[DevState] {
        &self.transitions
    }

    /// 保存 DMA 句柄并进入 [`DevState::DmaReady`]
    pub(super) fn install_dma(&mut self, handle: D) -> &D {
        self.set_state(DevState::DmaReady);
        self.dma.insert(handle)
    }

    pub(super) fn install_chrdev(&mut self, handle: C) {
        debug_assert!(
            self.dma.is_some(),
            "chrdev handle requires a live dma handle",
        );
        self.chrdev = Some(handle);
    }

    pub(super) fn take_dma(&mut self) -> Option<D> {
        debug_assert!(self.chrdev.is_none(), "dma handle released before chrdev");
        self.dma.take()
    }

    pub(super) fn take_chrdev(&mut self) -> Option<C> {
        self.chrdev.take()
    }
}
