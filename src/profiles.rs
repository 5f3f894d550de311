// ============================================================================
// Profiles
// ============================================================================

/// 페이지가 제공하는 다섯 개의 고정 프로필.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Default,
    One,
    Two,
    Three,
    Four,
}

impl Profile {
    pub const ALL: [Profile; 5] = [
        Profile::Default,
        Profile::One,
        Profile::Two,
        Profile::Three,
        Profile::Four,
    ];

    /// 클릭 대상 요소의 id이자 `.profileName[for=...]` 값
    pub fn dom_id(self) -> &'static str {
        match self {
            Profile::Default => "ProfileDef",
            Profile::One => "Profile1",
            Profile::Two => "Profile2",
            Profile::Three => "Profile3",
            Profile::Four => "Profile4",
        }
    }

    /// 실제 이름을 긁어오기 전까지 메뉴에 보이는 이름
    pub fn placeholder(self) -> &'static str {
        match self {
            Profile::Default => "Default",
            Profile::One => "Profile 1",
            Profile::Two => "Profile 2",
            Profile::Three => "Profile 3",
            Profile::Four => "Profile 4",
        }
    }

    pub fn from_dom_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.dom_id() == id)
    }

    /// `--translateY` 오프셋 인덱스 → 프로필 (0 = Default)
    pub fn from_offset_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Profile::Default),
            1 => Some(Profile::One),
            2 => Some(Profile::Two),
            3 => Some(Profile::Three),
            4 => Some(Profile::Four),
            _ => None,
        }
    }

    /// HTTP `port` 값 → 프로필 (1 = Default)
    pub fn from_port(port: u64) -> Option<Self> {
        match port {
            1 => Some(Profile::Default),
            2 => Some(Profile::One),
            3 => Some(Profile::Two),
            4 => Some(Profile::Three),
            5 => Some(Profile::Four),
            _ => None,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dom_id())
    }
}
