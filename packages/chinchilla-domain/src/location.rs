use regex::Regex;

const LONG_SUFFIX_PATTERN: &str = "(특별자치도|특별자치시|광역시|특별시|자치도)$";
const SHORT_SUFFIX_PATTERN: &str = "(도|시)$";
const PROVINCE_ALIASES: &[(&str, &str)] = &[
	("서울", "서울"),
	("서울시", "서울"),
	("서울특별시", "서울"),
	("부산", "부산"),
	("부산광역시", "부산"),
	("대구", "대구"),
	("대구광역시", "대구"),
	("인천", "인천"),
	("인천광역시", "인천"),
	("광주", "광주"),
	("광주광역시", "광주"),
	("대전", "대전"),
	("대전광역시", "대전"),
	("울산", "울산"),
	("울산광역시", "울산"),
	("세종", "세종"),
	("세종특별자치시", "세종"),
	("경기", "경기"),
	("경기도", "경기"),
	("강원", "강원"),
	("강원도", "강원"),
	("충북", "충북"),
	("충청북", "충북"),
	("충청북도", "충북"),
	("충남", "충남"),
	("충청남", "충남"),
	("충청남도", "충남"),
	("전북", "전북"),
	("전라북", "전북"),
	("전라북도", "전북"),
	("전남", "전남"),
	("전라남", "전남"),
	("전라남도", "전남"),
	("경북", "경북"),
	("경상북", "경북"),
	("경상북도", "경북"),
	("경남", "경남"),
	("경상남", "경남"),
	("경상남도", "경남"),
	("제주", "제주"),
	("제주도", "제주"),
	("제주특별자치도", "제주"),
];

/// A location split into its coarse (province) and specific (city) parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
	pub province: Option<String>,
	pub city: Option<String>,
}

/// Splits on commas, slashes and whitespace. The first token is the province, the rest is the
/// city.
pub fn normalize_location(text: &str) -> Location {
	let mut tokens = text
		.split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
		.filter(|token| !token.is_empty());
	let Some(first) = tokens.next() else { return Location::default() };
	let province = normalize_province(first);
	let city = tokens.collect::<Vec<_>>().join(" ");

	Location {
		province: if province.is_empty() { None } else { Some(province) },
		city: if city.is_empty() { None } else { Some(city) },
	}
}

pub fn normalize_province(token: &str) -> String {
	if let Some(alias) = lookup_alias(token) {
		return alias.to_string();
	}

	let trimmed = strip_suffix_pattern(token, LONG_SUFFIX_PATTERN);
	let trimmed = strip_suffix_pattern(&trimmed, SHORT_SUFFIX_PATTERN);

	if let Some(alias) = lookup_alias(&trimmed) {
		return alias.to_string();
	}
	if trimmed.is_empty() {
		return token.to_string();
	}

	trimmed
}

fn lookup_alias(token: &str) -> Option<&'static str> {
	PROVINCE_ALIASES.iter().find(|(alias, _)| *alias == token).map(|(_, canonical)| *canonical)
}

fn strip_suffix_pattern(token: &str, pattern: &str) -> String {
	Regex::new(pattern)
		.map(|re| re.replace(token, "").into_owned())
		.unwrap_or_else(|_| token.to_string())
}
