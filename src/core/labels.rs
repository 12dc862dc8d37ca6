//! 固定的四类标签

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum XRayClass {
    #[serde(rename = "Covid-19")]
    Covid19,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Pneumonia Viral")]
    PneumoniaViral,
    #[serde(rename = "Pneumonia Bacteriana")]
    PneumoniaBacterial,
}

impl XRayClass {
    /// 按模型输出的顺序排列，聚合时平票也按这个顺序取第一个
    pub const ALL: [XRayClass; 4] = [
        XRayClass::Covid19,
        XRayClass::Normal,
        XRayClass::PneumoniaViral,
        XRayClass::PneumoniaBacterial,
    ];

    pub fn id(self) -> usize {
        match self {
            XRayClass::Covid19 => 0,
            XRayClass::Normal => 1,
            XRayClass::PneumoniaViral => 2,
            XRayClass::PneumoniaBacterial => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            XRayClass::Covid19 => "Covid-19",
            XRayClass::Normal => "Normal",
            XRayClass::PneumoniaViral => "Pneumonia Viral",
            XRayClass::PneumoniaBacterial => "Pneumonia Bacteriana",
        }
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for XRayClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 四类上的概率分布，缺失的类别按 0 处理
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassDistribution([f32; 4]);

impl ClassDistribution {
    pub fn new(values: [f32; 4]) -> Self {
        Self(values)
    }

    /// 从 `类别名 -> 概率` 构建；遇到未知类别名时返回该名字
    pub fn from_named(named: &HashMap<String, f32>) -> Result<Self, String> {
        let mut values = [0.0f32; 4];
        for (name, &p) in named {
            let class = XRayClass::from_name(name).ok_or_else(|| name.clone())?;
            values[class.id()] = p;
        }
        Ok(Self(values))
    }

    pub fn get(&self, class: XRayClass) -> f32 {
        self.0[class.id()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (XRayClass, f32)> + '_ {
        XRayClass::ALL.iter().map(move |&c| (c, self.0[c.id()]))
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn add_assign(&mut self, other: &ClassDistribution) {
        for (acc, v) in self.0.iter_mut().zip(other.0.iter()) {
            *acc += v;
        }
    }

    pub fn scaled(&self, factor: f32) -> ClassDistribution {
        ClassDistribution(self.0.map(|v| v * factor))
    }

    /// 最大值对应的类别，平票时取 `XRayClass::ALL` 中靠前的那个
    pub fn argmax(&self) -> (XRayClass, f32) {
        let mut best = (XRayClass::ALL[0], self.0[0]);
        for (class, v) in self.iter().skip(1) {
            if v > best.1 {
                best = (class, v);
            }
        }
        best
    }
}

impl Serialize for ClassDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        for (class, p) in self.iter() {
            map.serialize_entry(class.name(), &p)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_and_names_roundtrip() {
        for class in XRayClass::ALL {
            assert_eq!(XRayClass::from_id(class.id()), Some(class));
            assert_eq!(XRayClass::from_name(class.name()), Some(class));
        }
        assert_eq!(XRayClass::from_id(4), None);
        assert_eq!(XRayClass::from_name("pneumonia viral"), None);
    }

    #[test]
    fn test_missing_class_is_zero() {
        let mut named = HashMap::new();
        named.insert("Normal".to_string(), 0.7);
        named.insert("Covid-19".to_string(), 0.3);

        let dist = ClassDistribution::from_named(&named).unwrap();
        assert_eq!(dist.get(XRayClass::PneumoniaViral), 0.0);
        assert_eq!(dist.get(XRayClass::PneumoniaBacterial), 0.0);
        assert!((dist.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let mut named = HashMap::new();
        named.insert("Tuberculosis".to_string(), 1.0);
        assert_eq!(
            ClassDistribution::from_named(&named),
            Err("Tuberculosis".to_string())
        );
    }

    #[test]
    fn test_argmax_tie_prefers_label_order() {
        let dist = ClassDistribution::new([0.1, 0.4, 0.4, 0.1]);
        assert_eq!(dist.argmax().0, XRayClass::Normal);
    }

    #[test]
    fn test_serializes_as_named_map() {
        let dist = ClassDistribution::new([0.25, 0.25, 0.5, 0.0]);
        let json = serde_json::to_value(dist).unwrap();
        assert_eq!(json["Pneumonia Viral"], 0.5);
        assert_eq!(json["Pneumonia Bacteriana"], 0.0);
    }
}
