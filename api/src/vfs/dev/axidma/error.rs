//! AXI DMA 驱动错误类型定义

use alloc::string::String;
use core::fmt;

use axerrno::AxError;

/// 模块参数错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// 参数值无法转换为参数类型
    BadValue {
        /// 参数名
        name: &'static str,
        /// 原始参数值
        value: String,
    },
    /// 参数缺少 `=value`
    MissingValue(&'static str),
    /// 未知参数
    Unknown(String),
    /// 参数在加载后只读
    ReadOnly(&'static str),
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadValue { name, value } => write!(f, "invalid value `{value}` for `{name}`"),
            Self::MissingValue(name) => write!(f, "`{name}` requires a value"),
            Self::Unknown(name) => write!(f, "unknown parameter `{name}`"),
            Self::ReadOnly(name) => write!(f, "`{name}` is read-only"),
        }
    }
}

/// DMA 子系统错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// CMA 区域大小为零、未按页对齐或大于物理内存
    InvalidRegion,
    /// 平台没有预留连续内存
    RegionUnavailable,
    /// 平台预留的区域与配置不符
    RegionMismatch,
    /// 区域已被占用
    RegionBusy,
    /// 没有找到 DMA 通道
    NoChannels,
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRegion => write!(f, "invalid region size"),
            Self::RegionUnavailable => write!(f, "region unavailable"),
            Self::RegionMismatch => write!(f, "region does not match reserved memory"),
            Self::RegionBusy => write!(f, "region busy"),
            Self::NoChannels => write!(f, "no dma channels found"),
        }
    }
}

impl DmaError {
    /// 获取错误码 (兼容 Linux errno 风格)
    pub fn as_errno(&self) -> i32 {
        match self {
            DmaError::InvalidRegion => -22,     // EINVAL
            DmaError::RegionUnavailable => -12, // ENOMEM
            DmaError::RegionMismatch => -22,
            DmaError::RegionBusy => -16, // EBUSY
            DmaError::NoChannels => -19, // ENODEV
        }
    }
}

impl From<DmaError> for AxError {
    fn from(err: DmaError) -> Self {
        match err {
            DmaError::InvalidRegion | DmaError::RegionMismatch => AxError::InvalidInput,
            DmaError::RegionUnavailable => AxError::NoMemory,
            DmaError::RegionBusy => AxError::AlreadyExists,
            DmaError::NoChannels => AxError::NotFound,
        }
    }
}

/// 字符设备子系统错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChrdevError {
    /// 无效参数
    InvalidArg,
    /// 设备名已被注册
    NameInUse,
    /// 没有可用的动态主设备号
    NoMajor,
    /// 设备节点已存在
    NodeExists,
}

impl fmt::Display for ChrdevError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArg => write!(f, "invalid argument"),
            Self::NameInUse => write!(f, "name in use"),
            Self::NoMajor => write!(f, "no free major number"),
            Self::NodeExists => write!(f, "device node exists"),
        }
    }
}

impl ChrdevError {
    /// 获取错误码 (兼容 Linux errno 风格)
    pub fn as_errno(&self) -> i32 {
        match self {
            ChrdevError::InvalidArg => -22, // EINVAL
            ChrdevError::NameInUse => -17,  // EEXIST
            ChrdevError::NoMajor => -16,    // EBUSY
            ChrdevError::NodeExists => -17,
        }
    }
}

impl From<ChrdevError> for AxError {
    fn from(err: ChrdevError) -> Self {
        match err {
            ChrdevError::InvalidArg => AxError::InvalidInput,
            ChrdevError::NameInUse | ChrdevError::NodeExists => AxError::AlreadyExists,
            ChrdevError::NoMajor => AxError::NoMemory,
        }
    }
}

/// 模块加载错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxidmaError {
    /// 模块参数无法解析
    ConfigInvalid(ParamError),
    /// DMA 子系统初始化失败
    DmaInitFailed(DmaError),
    /// 字符设备子系统初始化失败
    InterfaceInitFailed(ChrdevError),
    /// 本次加载已经尝试过启动
    AlreadyStarted,
    /// 模块已加载
    AlreadyLoaded,
}

impl fmt::Display for AxidmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(e) => write!(f, "invalid module parameter: {e}"),
            Self::DmaInitFailed(e) => write!(f, "dma init failed: {e}"),
            Self::InterfaceInitFailed(e) => write!(f, "chrdev init failed: {e}"),
            Self::AlreadyStarted => write!(f, "bring-up already attempted"),
            Self::AlreadyLoaded => write!(f, "module already loaded"),
        }
    }
}

impl AxidmaError {
    /// 获取错误码 (兼容 Linux errno 风格)，用于返回给宿主的加载钩子
    pub fn as_errno(&self) -> i32 {
        match self {
            AxidmaError::ConfigInvalid(ParamError::Unknown(_)) => -2, // ENOENT
            AxidmaError::ConfigInvalid(ParamError::ReadOnly(_)) => -13, // EACCES
            AxidmaError::ConfigInvalid(_) => -22,                      // EINVAL
            AxidmaError::DmaInitFailed(e) => e.as_errno(),
            AxidmaError::InterfaceInitFailed(e) => e.as_errno(),
            AxidmaError::AlreadyStarted => -16, // EBUSY
            AxidmaError::AlreadyLoaded => -17,  // EEXIST
        }
    }
}

impl From<ParamError> for AxidmaError {
    fn from(err: ParamError) -> Self {
        Self::ConfigInvalid(err)
    }
}

impl From<AxidmaError> for AxError {
    fn from(err: AxidmaError) -> Self {
        match err {
            AxidmaError::ConfigInvalid(ParamError::Unknown(_)) => AxError::NotFound,
            AxidmaError::ConfigInvalid(ParamError::ReadOnly(_)) => AxError::Unsupported,
            AxidmaError::ConfigInvalid(_) => AxError::InvalidInput,
            AxidmaError::DmaInitFailed(e) => e.into(),
            AxidmaError::InterfaceInitFailed(e) => e.into(),
            AxidmaError::AlreadyStarted | AxidmaError::AlreadyLoaded => AxError::AlreadyExists,
        }
    }
}

pub type ParamResult<T> = Result<T, ParamError>;
pub type DmaResult<T> = Result<T, DmaError>;
pub type ChrdevResult<T> = Result<T, ChrdevError>;
pub type AxidmaResult<T> = Result<T, AxidmaError>;
