//! AXI DMA 字符设备子系统
//!
//! 为用户态注册设备号区间并创建 `/dev/<chrdev_name>` 节点。

use alloc::{format, string::String, sync::Arc, vec::Vec};

use super::{
    dma::DmaHandle,
    error::{ChrdevError, ChrdevResult},
    types::DevId,
};

/// 字符设备子系统初始化参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChrdevConfig {
    pub name: String,
    /// 起始次设备号
    pub minor_num: i32,
    pub num_devices: u32,
}

/// 字符设备子系统生命周期
///
/// `init` 需要一个存活的 DMA 句柄，返回的句柄不得比它活得更久；
/// `exit` 不会失败。
pub trait ChrdevSubsystem {
    type Dma;
    type Handle;

    fn init(&mut self, config: &ChrdevConfig, dma: &Self::Dma) -> ChrdevResult<Self::Handle>;

    fn exit(&mut self, handle: Self::Handle);
}

/// 宿主提供的设备号与设备节点管理
pub trait ChrdevHost: Send + Sync {
    /// 分配动态主设备号，返回区间的第一个设备号
    fn alloc_region(&self, name: &str, minor_base: u32, count: u32) -> ChrdevResult<DevId>;

    fn unregister_region(&self, first: DevId, count: u32);

    /// 创建设备节点
    fn create_node(&self, name: &str, devt: DevId) -> ChrdevResult<()>;

    fn destroy_node(&self, devt: DevId);
}

/// 字符设备子系统句柄
pub struct ChrdevHandle {
    first: DevId,
    count: u32,
    nodes: Vec<(String, DevId)>,
    /// 节点打开期间 DMA 区域必须保持可用
    dma: DmaHandle,
}

impl ChrdevHandle {
    pub fn first(&self) -> DevId {
        self.first
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// 已创建的设备节点
    pub fn nodes(&self) -> impl Iterator<Item = (&str, DevId)> {
        self.nodes.iter().map(|(name, devt)| (name.as_str(), *devt))
    }

    pub fn dma(&self) -> &DmaHandle {
        &self.dma
    }
}

/// 基于 [`ChrdevHost`] 的字符设备子系统
pub struct AxiDmaChrdev {
    host: Arc<dyn ChrdevHost>,
}

impl AxiDmaChrdev {
    pub fn new(host: Arc<dyn ChrdevHost>) -> Self {
        Self { host }
    }

    fn validate(config: &ChrdevConfig) -> ChrdevResult<u32> {
        if config.name.is_empty() || config.name.contains('/') {
            error!("Invalid character device name {:?}", config.name);
            return Err(ChrdevError::InvalidArg);
        }
        let Ok(minor_base) = u32::try_from(config.minor_num) else {
            error!("Invalid minor number {}", config.minor_num);
            return Err(ChrdevError::InvalidArg);
        };
        let fits = minor_base
            .checked_add(config.num_devices)
            .is_some_and(|end| end <= DevId::MINOR_MASK + 1);
        if config.num_devices == 0 || !fits {
            error!(
                "Minor range {}+{} does not fit",
                minor_base, config.num_devices
            );
            return Err(ChrdevError::InvalidArg);
        }
        Ok(minor_base)
    }

    fn node_name(config: &ChrdevConfig, index: u32) -> String {
        if config.num_devices == 1 {
            config.name.clone()
        } else {
            format!("{}{}", config.name, index)
        }
    }

    fn remove_nodes(&self, nodes: &mut Vec<(String, DevId)>) {
        while let Some((name, devt)) = nodes.pop() {
            debug!("Removing device node /dev/{}", name);
            self.host.destroy_node(devt);
        }
    }
}

impl ChrdevSubsystem for AxiDmaChrdev {
    type Dma = DmaHandle;
    type Handle = ChrdevHandle;

    fn init(&mut self, config: &ChrdevConfig, dma: &DmaHandle) -> ChrdevResult<ChrdevHandle> {
        let minor_base = Self::validate(config)?;

        let first = self
            .host
            .alloc_region(&config.name, minor_base, config.num_devices)
            .inspect_err(|e| {
                error!(
                    "Unable to allocate device numbers for {}: {}",
                    config.name, e
                )
            })?;

        let mut nodes = Vec::with_capacity(config.num_devices as usize);
        for index in 0..config.num_devices {
            let name = Self::node_name(config, index);
            let devt = DevId::new(first.major(), first.minor() + index);
            if let Err(e) = self.host.create_node(&name, devt) {
                error!("Unable to create device node /dev/{}: {}", name, e);
                self.remove_nodes(&mut nodes);
                self.host.unregister_region(first, config.num_devices);
                return Err(e);
            }
            nodes.push((name, devt));
        }

        info!(
            "Character device {} registered: major {}, minors {}..{}",
            config.name,
            first.major(),
            minor_base,
            minor_base + config.num_devices
        );
        Ok(ChrdevHandle {
            first,
            count: config.num_devices,
            nodes,
            dma: dma.clone(),
        })
    }

    fn exit(&mut self, handle: ChrdevHandle) {
        let ChrdevHandle {
            first,
            count,
            mut nodes,
            dma,
        } = handle;
        self.remove_nodes(&mut nodes);
        self.host.unregister_region(first, count);
        drop(dma);
        info!("Character device major {} unregistered", first.major());
    }
}
