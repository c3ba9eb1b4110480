//! 模块参数
//!
//! 对应 Linux 的 `module_param`：加载时从参数串中读入，之后只读。
//! 这一层只做类型转换，区域是否可用由 DMA 子系统初始化时检查。

use alloc::{
    format,
    string::{String, ToString},
};

use bitflags::bitflags;

use super::{
    CHRDEV_NAME, CMA_REGION_SIZE, MEMORY_SIZE, MINOR_NUMBER,
    error::{ParamError, ParamResult},
};

/// 内核命令行中写法为 `axidma.<name>=<value>`
const PARAM_PREFIX: &str = "axidma.";

bitflags! {
    /// 参数文件权限位，取值与 `S_IRUSR` 等相同
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamPerm: u16 {
        const IRUSR = 0o400;
        const IWUSR = 0o200;
        const IRGRP = 0o040;
        const IROTH = 0o004;
        const IRUGO = Self::IRUSR.bits() | Self::IRGRP.bits() | Self::IROTH.bits();
    }
}

/// 参数对应的字段，同时决定取值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    /// `ulong`
    MaxPhysMem,
    /// `ulong`
    CmaRegionSize,
    /// `charp`
    ChrdevName,
    /// `int`
    MinorNum,
}

/// 参数描述
#[derive(Debug, Clone, Copy)]
pub struct ParamDesc {
    pub name: &'static str,
    pub field: ParamField,
    pub perm: ParamPerm,
}

/// 模块支持的全部参数
pub const PARAMS: [ParamDesc; 4] = [
    ParamDesc {
        name: "max_phys_mem",
        field: ParamField::MaxPhysMem,
        perm: ParamPerm::IRUGO,
    },
    ParamDesc {
        name: "cma_region_size",
        field: ParamField::CmaRegionSize,
        perm: ParamPerm::IRUGO,
    },
    ParamDesc {
        name: "chrdev_name",
        field: ParamField::ChrdevName,
        perm: ParamPerm::IRUGO,
    },
    ParamDesc {
        name: "minor_num",
        field: ParamField::MinorNum,
        perm: ParamPerm::IRUGO,
    },
];

fn find_param(name: &str) -> Option<&'static ParamDesc> {
    PARAMS.iter().find(|desc| desc.name == name)
}

/// 模块参数取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxidmaParams {
    /// 板载物理内存大小，决定 CMA 区域的预期位置
    pub max_phys_mem: usize,
    /// 预留给 DMA 的连续内存大小，必须与 `mem=...` 一致
    pub cma_region_size: usize,
    /// 字符设备名称
    pub chrdev_name: String,
    /// 起始次设备号
    pub minor_num: i32,
}

impl Default for AxidmaParams {
    fn default() -> Self {
        Self {
            max_phys_mem: MEMORY_SIZE,
            cma_region_size: CMA_REGION_SIZE,
            chrdev_name: CHRDEV_NAME.to_string(),
            minor_num: MINOR_NUMBER,
        }
    }
}

impl AxidmaParams {
    /// 从加载参数串解析，未给出的参数取默认值
    ///
    /// 参数串形如 `cma_region_size=0x6400000 chrdev_name="axidma"`，
    /// 未知参数记录警告后忽略。
    pub fn parse(args: &str) -> ParamResult<Self> {
        let mut params = Self::default();
        for arg in split_args(args) {
            let arg = arg.strip_prefix(PARAM_PREFIX).unwrap_or(arg);
            let (name, value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (arg, None),
            };
            let Some(desc) = find_param(name) else {
                warn!("axidma: unknown parameter '{}' ignored", name);
                continue;
            };
            let value = value.ok_or(ParamError::MissingValue(desc.name))?;
            params.set(desc, unquote(value))?;
        }
        debug!("axidma params: {:?}", params);
        Ok(params)
    }

    /// 读取参数的文本形式，与 `/sys/module/axidma/parameters/<name>` 一致
    pub fn get(&self, name: &str) -> ParamResult<String> {
        let desc = find_param(name).ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        Ok(match desc.field {
            ParamField::MaxPhysMem => format!("{}", self.max_phys_mem),
            ParamField::CmaRegionSize => format!("{}", self.cma_region_size),
            ParamField::ChrdevName => self.chrdev_name.clone(),
            ParamField::MinorNum => format!("{}", self.minor_num),
        })
    }

    /// 运行时写入参数，只有带写权限的参数可以修改
    pub fn store(&mut self, name: &str, value: &str) -> ParamResult<()> {
        let desc = find_param(name).ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        if !desc.perm.contains(ParamPerm::IWUSR) {
            return Err(ParamError::ReadOnly(desc.name));
        }
        self.set(desc, value)
    }

    fn set(&mut self, desc: &'static ParamDesc, value: &str) -> ParamResult<()> {
        let bad_value = || ParamError::BadValue {
            name: desc.name,
            value: value.to_string(),
        };
        match desc.field {
            ParamField::MaxPhysMem => self.max_phys_mem = parse_ulong(value).ok_or_else(bad_value)?,
            ParamField::CmaRegionSize => {
                self.cma_region_size = parse_ulong(value).ok_or_else(bad_value)?
            }
            ParamField::ChrdevName => self.chrdev_name = value.to_string(),
            ParamField::MinorNum => self.minor_num = parse_int(value).ok_or_else(bad_value)?,
        }
        Ok(())
    }
}

/// 按空白拆分参数，双引号内的空白不拆分
fn split_args(args: &str) -> impl Iterator<Item = &str> {
    let mut rest = args;
    core::iter::from_fn(move || {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let mut in_quote = false;
        let end = rest
            .char_indices()
            .find(|&(_, c)| {
                if c == '"' {
                    in_quote = !in_quote;
                }
                c.is_whitespace() && !in_quote
            })
            .map_or(rest.len(), |(idx, _)| idx);
        let (arg, tail) = rest.split_at(end);
        rest = tail;
        Some(arg)
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// `kstrtoul(s, 0)` 规则：`0x` 前缀为十六进制，`0` 前缀为八进制
fn parse_magnitude(s: &str) -> Option<u64> {
    let s = s.strip_suffix('\n').unwrap_or(s);
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let (digits, radix) = if let Some(hex) = hex {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    if !digits.starts_with(|c: char| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn parse_ulong(s: &str) -> Option<usize> {
    let s = s.strip_prefix('+').unwrap_or(s);
    parse_magnitude(s).and_then(|v| usize::try_from(v).ok())
}

fn parse_int(s: &str) -> Option<i32> {
    if let Some(neg) = s.strip_prefix('-') {
        let v = i64::try_from(parse_magnitude(neg)?).ok()?;
        i32::try_from(-v).ok()
    } else {
        let s = s.strip_prefix('+').unwrap_or(s);
        i32::try_from(parse_magnitude(s)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_overrides() {
        let params = AxidmaParams::parse("").unwrap();
        assert_eq!(params.max_phys_mem, 512 * 1024 * 1024);
        assert_eq!(params.cma_region_size, 100 * 1024 * 1024);
        assert_eq!(params.chrdev_name, "axidma");
        assert_eq!(params.minor_num, 0);
        assert_eq!(params, AxidmaParams::default());
    }

    #[test]
    fn overrides_are_coerced() {
        let args = "max_phys_mem=0x40000000 axidma.cma_region_size=0200000000 \
                    chrdev_name=\"dma0\" minor_num=-3";
        let params = AxidmaParams::parse(args).unwrap();
        assert_eq!(params.max_phys_mem, 0x4000_0000);
        assert_eq!(params.cma_region_size, 0o200000000);
        assert_eq!(params.chrdev_name, "dma0");
        assert_eq!(params.minor_num, -3);
    }

    #[test]
    fn quoted_value_keeps_spaces() {
        let params = AxidmaParams::parse("chrdev_name=\"axi dma\" minor_num=2").unwrap();
        assert_eq!(params.chrdev_name, "axi dma");
        assert_eq!(params.minor_num, 2);
    }

    #[test]
    fn unknown_parameter_is_ignored() {
        let params = AxidmaParams::parse("dyndbg=+p minor_num=1").unwrap();
        assert_eq!(params.minor_num, 1);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            AxidmaParams::parse("cma_region_size=100M"),
            Err(ParamError::BadValue {
                name: "cma_region_size",
                value: "100M".to_string(),
            })
        );
        assert!(AxidmaParams::parse("max_phys_mem=-1").is_err());
        assert!(AxidmaParams::parse("max_phys_mem=0x").is_err());
        assert!(AxidmaParams::parse("minor_num=0x80000000").is_err());
        assert_eq!(
            AxidmaParams::parse("minor_num"),
            Err(ParamError::MissingValue("minor_num"))
        );
    }

    #[test]
    fn params_are_read_only() {
        let mut params = AxidmaParams::default();
        assert_eq!(params.get("cma_region_size").unwrap(), "104857600");
        assert_eq!(params.get("chrdev_name").unwrap(), "axidma");
        assert_eq!(
            params.store("minor_num", "4"),
            Err(ParamError::ReadOnly("minor_num"))
        );
        assert_eq!(params.minor_num, 0);
        assert!(matches!(params.get("foo"), Err(ParamError::Unknown(_))));
    }

    #[test]
    fn every_param_reads_its_own_field() {
        let params = AxidmaParams {
            max_phys_mem: 0x4000_0000,
            cma_region_size: 0x20_0000,
            chrdev_name: "fabric".to_string(),
            minor_num: 7,
        };
        let values: alloc::vec::Vec<_> = PARAMS
            .iter()
            .map(|desc| params.get(desc.name).unwrap())
            .collect();
        assert_eq!(values, ["1073741824", "2097152", "fabric", "7"]);

        for desc in &PARAMS {
            let mut copy = params.clone();
            copy.set(desc, "3").unwrap();
            assert_eq!(copy.get(desc.name).unwrap(), "3");
            let others_untouched = PARAMS
                .iter()
                .filter(|other| other.field != desc.field)
                .all(|other| copy.get(other.name) == params.get(other.name));
            assert!(others_untouched, "setting {} changed another field", desc.name);
        }
    }
}
