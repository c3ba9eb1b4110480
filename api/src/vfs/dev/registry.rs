//! 字符设备号管理

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use spin::Mutex;

use super::axidma::{
    chrdev::ChrdevHost,
    error::{ChrdevError, ChrdevResult},
    types::DevId,
};

/// 动态分配主设备号的范围 (自高向低分配)，与 Linux 相同
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// 已注册的设备号区间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChrdevRegion {
    pub name: String,
    pub first: DevId,
    pub count: u32,
}

impl ChrdevRegion {
    fn contains(&self, devt: DevId) -> bool {
        devt.major() == self.first.major()
            && devt.minor() >= self.first.minor()
            && devt.minor() - self.first.minor() < self.count
    }
}

struct RegistryInner {
    /// 主设备号 -> 区间
    regions: BTreeMap<u32, ChrdevRegion>,
    /// 设备号 -> 节点名
    nodes: BTreeMap<DevId, String>,
}

/// 内存中的字符设备注册表
pub struct DevRegistry {
    inner: Mutex<RegistryInner>,
}

impl DevRegistry {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                regions: BTreeMap::new(),
                nodes: BTreeMap::new(),
            }),
        }
    }

    /// 按节点名查找设备号
    pub fn lookup_node(&self, name: &str) -> Option<DevId> {
        let inner = self.inner.lock();
        inner
            .nodes
            .iter()
            .find(|(_, node)| node.as_str() == name)
            .map(|(devt, _)| *devt)
    }

    /// 获取所有已注册的区间
    pub fn regions(&self) -> Vec<ChrdevRegion> {
        self.inner.lock().regions.values().cloned().collect()
    }

    pub fn region_count(&self) -> usize {
        self.inner.lock().regions.len()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

impl Default for DevRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChrdevHost for DevRegistry {
    fn alloc_region(&self, name: &str, minor_base: u32, count: u32) -> ChrdevResult<DevId> {
        let mut inner = self.inner.lock();
        if inner.regions.values().any(|region| region.name == name) {
            return Err(ChrdevError::NameInUse);
        }

        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .find(|major| !inner.regions.contains_key(major))
            .ok_or(ChrdevError::NoMajor)?;

        let first = DevId::new(major, minor_base);
        inner.regions.insert(
            major,
            ChrdevRegion {
                name: String::from(name),
                first,
                count,
            },
        );
        debug!("Registered chrdev region {}: major {}", name, major);
        Ok(first)
    }

    fn unregister_region(&self, first: DevId, count: u32) {
        let mut inner = self.inner.lock();
        match inner.regions.remove(&first.major()) {
            Some(region) => {
                if region.first != first || region.count != count {
                    warn!(
                        "Unregistering chrdev region {} with mismatched range {}+{}",
                        region.name,
                        first.minor(),
                        count
                    );
                }
                let leaked = inner
                    .nodes
                    .keys()
                    .filter(|devt| region.contains(**devt))
                    .count();
                if leaked > 0 {
                    warn!(
                        "{} device nodes still exist in region {}",
                        leaked,
                        region.name,
                    );
                }
                debug!("Unregistered chrdev region {}", region.name);
            }
            None => warn!("No chrdev region with major {}", first.major()),
        }
    }

    fn create_node(&self, name: &str, devt: DevId) -> ChrdevResult<()> {
        let mut inner = self.inner.lock();
        if !inner.regions.values().any(|region| region.contains(devt)) {
            return Err(ChrdevError::InvalidArg);
        }
        if inner.nodes.contains_key(&devt) || inner.nodes.values().any(|node| node == name) {
            return Err(ChrdevError::NodeExists);
        }
        inner.nodes.insert(devt, String::from(name));
        debug!(
            "Created device node /dev/{} ({}:{})",
            name,
            devt.major(),
            devt.minor()
        );
        Ok(())
    }

    fn destroy_node(&self, devt: DevId) {
        if self.inner.lock().nodes.remove(&devt).is_none() {
            warn!("No device node for {}:{}", devt.major(), devt.minor());
        }
    }
}
