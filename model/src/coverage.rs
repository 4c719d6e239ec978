use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

const PROVINCES: [&str; 34] = [
    "北京", "天津", "上海", "重庆", "河北", "山西", "辽宁", "吉林", "黑龙江", "江苏", "浙江", "安徽",
    "福建", "江西", "山东", "河南", "湖北", "湖南", "广东", "海南", "四川", "贵州", "云南", "西藏",
    "陕西", "甘肃", "青海", "台湾", "内蒙古", "广西", "宁夏", "新疆", "香港", "澳门",
];

const CITIES: [(&str, &str); 73] = [
    ("北京", "北京"),
    ("上海", "上海"),
    ("天津", "天津"),
    ("重庆", "重庆"),
    ("武汉", "湖北"),
    ("孝感", "湖北"),
    ("宜昌", "湖北"),
    ("黄冈", "湖北"),
    ("荆州", "湖北"),
    ("襄阳", "湖北"),
    ("黄石", "湖北"),
    ("十堰", "湖北"),
    ("恩施", "湖北"),
    ("咸宁", "湖北"),
    ("鄂州", "湖北"),
    ("长沙", "湖南"),
    ("株洲", "湖南"),
    ("衡阳", "湖南"),
    ("永州", "湖南"),
    ("张家界", "湖南"),
    ("岳阳", "湖南"),
    ("郴州", "湖南"),
    ("怀化", "湖南"),
    ("湘潭", "湖南"),
    ("成都", "四川"),
    ("峨眉山", "四川"),
    ("绵阳", "四川"),
    ("德阳", "四川"),
    ("乐山", "四川"),
    ("洛阳", "河南"),
    ("郑州", "河南"),
    ("开封", "河南"),
    ("新乡", "河南"),
    ("保定", "河北"),
    ("石家庄", "河北"),
    ("唐山", "河北"),
    ("杭州", "浙江"),
    ("宁波", "浙江"),
    ("温州", "浙江"),
    ("嘉兴", "浙江"),
    ("南京", "江苏"),
    ("苏州", "江苏"),
    ("无锡", "江苏"),
    ("广州", "广东"),
    ("深圳", "广东"),
    ("珠海", "广东"),
    ("佛山", "广东"),
    ("厦门", "福建"),
    ("福州", "福建"),
    ("武夷山", "福建"),
    ("南昌", "江西"),
    ("九江", "江西"),
    ("庐山", "江西"),
    ("青岛", "山东"),
    ("济南", "山东"),
    ("西安", "陕西"),
    ("太原", "山西"),
    ("沈阳", "辽宁"),
    ("长春", "吉林"),
    ("哈尔滨", "黑龙江"),
    ("海口", "海南"),
    ("贵阳", "贵州"),
    ("昆明", "云南"),
    ("拉萨", "西藏"),
    ("兰州", "甘肃"),
    ("西宁", "青海"),
    ("呼和浩特", "内蒙古"),
    ("南宁", "广西"),
    ("银川", "宁夏"),
    ("乌鲁木齐", "新疆"),
    ("香港", "香港"),
    ("澳门", "澳门"),
    ("台北", "台湾"),
];

/// Maps free-text locations to a fixed list of provinces. Both lists are ordered, and the first
/// match wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvinceTable {
    pub provinces: Vec<String>,
    pub city_to_province: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Coverage {
    pub matched_provinces: BTreeSet<String>,
    pub count: usize,
    /// Rounded to one decimal place
    pub percent: f64,
}

impl ProvinceTable {
    /// The provincial-level divisions of China
    pub fn china() -> Self {
        Self {
            provinces: PROVINCES.iter().map(|p| p.to_string()).collect(),
            city_to_province: CITIES
                .iter()
                .map(|(city, province)| (city.to_string(), province.to_string()))
                .collect(),
        }
    }

    /// JSON with `provinces` and `city_to_province` (a list of `[city, province]` pairs)
    pub fn load(path: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(&fs_err::read_to_string(path)?)?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for province in &self.provinces {
            if province.trim().is_empty() {
                bail!("Blank province name");
            }
            if !seen.insert(province) {
                bail!("Duplicate province {}", province);
            }
        }
        for (city, province) in &self.city_to_province {
            if !seen.contains(province) {
                bail!("{} maps to unknown province {}", city, province);
            }
        }
        Ok(())
    }

    /// Province names are checked before city names. A location mentioning two provinces just
    /// gets the first one in table order.
    pub fn map_to_province(&self, location: &str) -> Option<&str> {
        let text = location.to_lowercase();
        for province in &self.provinces {
            if text.contains(&province.to_lowercase()) {
                return Some(province.as_str());
            }
        }
        for (city, province) in &self.city_to_province {
            if text.contains(&city.to_lowercase()) {
                return Some(province.as_str());
            }
        }
        None
    }

    pub fn compute_coverage<'a, I: IntoIterator<Item = &'a str>>(&self, locations: I) -> Coverage {
        let mut matched_provinces = BTreeSet::new();
        for location in locations {
            match self.map_to_province(location) {
                Some(province) => {
                    matched_provinces.insert(province.to_string());
                }
                None => {
                    debug!("{:?} isn't in any known province", location);
                }
            }
        }
        let count = matched_provinces.len();
        let percent = if self.provinces.is_empty() {
            0.0
        } else {
            (count as f64 / self.provinces.len() as f64 * 1000.0).round() / 10.0
        };
        Coverage {
            matched_provinces,
            count,
            percent,
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} provinces covered ({:.1}%)", self.count, self.percent)
    }
}
