//! AXI DMA 子系统
//!
//! 占用位于物理内存顶端的 CMA 区域并探测 DMA 通道。

use alloc::{sync::Arc, vec::Vec};

use memory_addr::{PAGE_SIZE_4K, PhysAddr, PhysAddrRange};

use super::{
    error::{DmaError, DmaResult},
    platform::{DmaChannelInfo, DmaPlatform},
};

/// DMA 子系统初始化参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaConfig {
    /// 板载物理内存大小
    pub mem_size: usize,
    /// CMA 区域大小
    pub cma_len: usize,
}

/// DMA 子系统生命周期
///
/// `init` 失败时不得残留任何已占用的资源；`exit` 不会失败，
/// 对每个成功返回的句柄只调用一次。
pub trait DmaSubsystem {
    type Handle;

    fn init(&mut self, config: &DmaConfig) -> DmaResult<Self::Handle>;

    fn exit(&mut self, handle: Self::Handle);
}

/// 已就绪的 DMA 引擎
#[derive(Debug)]
pub struct DmaEngine {
    region: PhysAddrRange,
    channels: Vec<DmaChannelInfo>,
}

impl DmaEngine {
    /// 占用的 CMA 区域
    pub fn region(&self) -> PhysAddrRange {
        self.region
    }

    pub fn channels(&self) -> &[DmaChannelInfo] {
        &self.channels
    }
}

/// DMA 子系统句柄
///
/// 字符设备子系统持有它的克隆，必须在 DMA 子系统退出前释放。
#[derive(Debug, Clone)]
pub struct DmaHandle(Arc<DmaEngine>);

impl DmaHandle {
    pub fn engine(&self) -> &DmaEngine {
        &self.0
    }

    /// 当前存活的句柄数量
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

/// 基于 [`DmaPlatform`] 的 AXI DMA 子系统
pub struct AxiDmaEngine {
    platform: Arc<dyn DmaPlatform>,
}

impl AxiDmaEngine {
    pub fn new(platform: Arc<dyn DmaPlatform>) -> Self {
        Self { platform }
    }

    /// CMA 区域应位于物理内存顶端 `[mem_size - cma_len, mem_size)`
    fn expected_region(config: &DmaConfig) -> DmaResult<PhysAddrRange> {
        let DmaConfig { mem_size, cma_len } = *config;
        if cma_len == 0 || cma_len % PAGE_SIZE_4K != 0 || cma_len > mem_size {
            error!(
                "Invalid CMA region size 0x{:x} for 0x{:x} bytes of memory",
                cma_len, mem_size
            );
            return Err(DmaError::InvalidRegion);
        }
        Ok(PhysAddrRange::from_start_size(
            PhysAddr::from(mem_size - cma_len),
            cma_len,
        ))
    }
}

impl DmaSubsystem for AxiDmaEngine {
    type Handle = DmaHandle;

    fn init(&mut self, config: &DmaConfig) -> DmaResult<DmaHandle> {
        let region = Self::expected_region(config)?;

        let Some(reserved) = self.platform.reserved_region() else {
            error!(
                "No contiguous memory reserved, check the `mem=` boot argument"
            );
            return Err(DmaError::RegionUnavailable);
        };
        if !reserved.contains_range(region) {
            error!(
                "CMA region {:#x}..{:#x} lies outside reserved memory {:#x}..{:#x}",
                region.start.as_usize(),
                region.end.as_usize(),
                reserved.start.as_usize(),
                reserved.end.as_usize()
            );
            return Err(DmaError::RegionMismatch);
        }

        self.platform.claim_region(region)?;

        let channels = self.platform.probe_channels();
        if channels.is_empty() {
            error!("No AXI DMA channels found");
            self.platform.release_region(region);
            return Err(DmaError::NoChannels);
        }
        for chan in &channels {
            debug!(
                "Found {:?} channel {} ({:?})",
                chan.kind, chan.channel_id, chan.direction
            );
        }

        info!(
            "DMA: {} channels, CMA region at 0x{:x}, {} bytes",
            channels.len(),
            region.start.as_usize(),
            config.cma_len
        );
        Ok(DmaHandle(Arc::new(DmaEngine { region, channels })))
    }

    fn exit(&mut self, handle: DmaHandle) {
        let refs = handle.ref_count();
        if refs > 1 {
            warn!(
                "DMA exiting with {} outstanding handle references",
                refs - 1,
            );
        }
        let region = handle.engine().region();
        self.platform.release_region(region);
        info!(
            "DMA: released CMA region at 0x{:x}",
            region.start.as_usize(),
        );
    }
}
