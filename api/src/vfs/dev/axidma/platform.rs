//! AXI DMA 平台接口
//!
//! DMA 子系统通过 [`DmaPlatform`] 获取引导时预留的连续内存和设备树中的
//! DMA 通道。

use alloc::vec::Vec;

use memory_addr::PhysAddrRange;
use spin::Mutex;

use super::error::{DmaError, DmaResult};

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// 内存到设备 (TX, MM2S)
    MemToDev,
    /// 设备到内存 (RX, S2MM)
    DevToMem,
}

/// 通道所属的 IP 核
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaChannelKind {
    /// AXI DMA
    Dma,
    /// AXI VDMA
    Vdma,
}

/// DMA 通道信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelInfo {
    /// 设备树中的通道 ID
    pub channel_id: u32,
    pub kind: DmaChannelKind,
    pub direction: DmaDirection,
}

/// 平台相关操作
pub trait DmaPlatform: Send + Sync {
    /// 引导时预留的连续物理内存，没有预留时返回 `None`
    fn reserved_region(&self) -> Option<PhysAddrRange>;

    /// 占用预留内存中的一段，调用者保证 `region` 位于 [`reserved_region`]
    /// 之内
    ///
    /// [`reserved_region`]: Self::reserved_region
    fn claim_region(&self, region: PhysAddrRange) -> DmaResult<()>;

    /// 归还 [`claim_region`](Self::claim_region) 占用的区域
    fn release_region(&self, region: PhysAddrRange);

    /// 探测可用的 DMA 通道
    fn probe_channels(&self) -> Vec<DmaChannelInfo>;
}

/// 固定预留区域和通道表的平台实现
pub struct StaticCmaPlatform {
    reserved: Option<PhysAddrRange>,
    channels: Vec<DmaChannelInfo>,
    /// 当前被占用的区域
    claimed: Mutex<Option<PhysAddrRange>>,
}

impl StaticCmaPlatform {
    pub fn new(reserved: Option<PhysAddrRange>, channels: Vec<DmaChannelInfo>) -> Self {
        Self {
            reserved,
            channels,
            claimed: Mutex::new(None),
        }
    }

    /// 当前被占用的区域
    pub fn claimed(&self) -> Option<PhysAddrRange> {
        *self.claimed.lock()
    }
}

impl DmaPlatform for StaticCmaPlatform {
    fn reserved_region(&self) -> Option<PhysAddrRange> {
        self.reserved
    }

    fn claim_region(&self, region: PhysAddrRange) -> DmaResult<()> {
        if self.reserved.is_none() {
            return Err(DmaError::RegionUnavailable);
        }

        let mut claimed = self.claimed.lock();
        if claimed.is_some() {
            return Err(DmaError::RegionBusy);
        }
        *claimed = Some(region);
        debug!(
            "Claimed CMA region: {:#x}..{:#x}",
            region.start.as_usize(),
            region.end.as_usize()
        );
        Ok(())
    }

    fn release_region(&self, region: PhysAddrRange) {
        let mut claimed = self.claimed.lock();
        if *claimed == Some(region) {
            *claimed = None;
        } else {
            warn!(
                "Releasing unclaimed CMA region: {:#x}..{:#x}",
                region.start.as_usize(),
                region.end.as_usize()
            );
        }
    }

    fn probe_channels(&self) -> Vec<DmaChannelInfo> {
        self.channels.clone()
    }
}
