//! AXI DMA 桥接驱动
//!
//! 驱动由两个相互依赖的子系统组成：
//!
//! - DMA 子系统：占用启动时预留的连续物理内存 (CMA 区域)，并探测 DMA 通道
//! - 字符设备子系统：向用户态注册 `/dev/axidma` 设备节点，依赖 DMA 子系统
//!
//! [`AxidmaModule`] 负责按顺序启动这两个子系统，任何一步失败都会回滚已完成
//! 的步骤，保证两者要么同时可用，要么都不存在。
//!
//! ## 模块参数
//!
//! | 名称 | 类型 | 默认值 |
//! |---|---|---|
//! | `max_phys_mem` | ulong | [`MEMORY_SIZE`] |
//! | `cma_region_size` | ulong | [`CMA_REGION_SIZE`] |
//! | `chrdev_name` | charp | [`CHRDEV_NAME`] |
//! | `minor_num` | int | [`MINOR_NUMBER`] |
//!
//! `cma_region_size` 必须与引导参数中 `mem=...` 预留出的区域一致，
//! 否则 DMA 子系统初始化失败。

pub mod chrdev;
pub mod dma;
pub mod error;
pub mod lifecycle;
pub mod param;
pub mod platform;
pub mod types;

pub use chrdev::{AxiDmaChrdev, ChrdevConfig, ChrdevHandle, ChrdevHost, ChrdevSubsystem};
pub use dma::{AxiDmaEngine, DmaConfig, DmaHandle, DmaSubsystem};
pub use error::{AxidmaError, AxidmaResult, ChrdevError, DmaError, ParamError};
pub use lifecycle::AxidmaModule;
pub use param::AxidmaParams;
pub use platform::{DmaChannelInfo, DmaChannelKind, DmaDirection, DmaPlatform, StaticCmaPlatform};
pub use types::{AxidmaDevice, DevId, DevState};

/// 板载物理内存大小 (Zedboard: 512 MiB)，决定 CMA 区域的预期位置
pub const MEMORY_SIZE: usize = 512 * 1024 * 1024;

/// 预留给 DMA 的连续内存大小 (100 MiB)
pub const CMA_REGION_SIZE: usize = 100 * 1024 * 1024;

/// 字符设备默认名称
pub const CHRDEV_NAME: &str = "axidma";

/// 字符设备默认起始次设备号
pub const MINOR_NUMBER: i32 = 0;

/// 暴露的设备节点数量
pub const NUM_DEVICES: u32 = 1;
