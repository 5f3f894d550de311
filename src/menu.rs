use std::collections::HashMap;

use crate::profiles::Profile;

/// 프로필이 아닌 고정 메뉴 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticAction {
    Refresh,
    ToggleWindow,
    Exit,
}

impl StaticAction {
    fn menu_id(self) -> &'static str {
        match self {
            StaticAction::Refresh => "refresh",
            StaticAction::ToggleWindow => "toggle-window",
            StaticAction::Exit => "exit",
        }
    }
}

/// 트레이 메뉴 클릭이 뜻하는 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    Activate(Profile),
    Static(StaticAction),
}

const PROFILE_ID_PREFIX: &str = "profile:";

impl TrayAction {
    /// 네이티브 메뉴 항목 id
    pub fn menu_id(self) -> String {
        match self {
            TrayAction::Activate(p) => format!("{}{}", PROFILE_ID_PREFIX, p.dom_id()),
            TrayAction::Static(a) => a.menu_id().to_string(),
        }
    }

    pub fn from_menu_id(id: &str) -> Option<Self> {
        if let Some(dom_id) = id.strip_prefix(PROFILE_ID_PREFIX) {
            return Profile::from_dom_id(dom_id).map(TrayAction::Activate);
        }
        [StaticAction::Refresh, StaticAction::ToggleWindow, StaticAction::Exit]
            .into_iter()
            .find(|a| a.menu_id() == id)
            .map(TrayAction::Static)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Profile { profile: Profile, label: String },
    Action { action: StaticAction, label: String },
    Separator,
}

impl MenuEntry {
    pub fn action(&self) -> Option<TrayAction> {
        match self {
            MenuEntry::Profile { profile, .. } => Some(TrayAction::Activate(*profile)),
            MenuEntry::Action { action, .. } => Some(TrayAction::Static(*action)),
            MenuEntry::Separator => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            MenuEntry::Profile { label, .. } | MenuEntry::Action { label, .. } => Some(label.as_str()),
            MenuEntry::Separator => None,
        }
    }
}

/// 트레이 메뉴 모델.
///
/// 항목의 종류와 순서는 생성 후 바뀌지 않고 프로필 라벨만 바뀐다.
/// 네이티브 메뉴는 붙인 뒤 수정할 수 없으므로 `render()` 스냅샷으로 매번 새로 만든다.
#[derive(Debug, Clone, PartialEq)]
pub struct TrayMenuModel {
    entries: Vec<MenuEntry>,
}

impl Default for TrayMenuModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TrayMenuModel {
    pub fn new() -> Self {
        let mut entries: Vec<MenuEntry> = Profile::ALL
            .into_iter()
            .map(|profile| MenuEntry::Profile {
                profile,
                label: profile.placeholder().to_string(),
            })
            .collect();
        entries.push(MenuEntry::Separator);
        entries.push(MenuEntry::Action { action: StaticAction::Refresh, label: "Refresh".into() });
        entries.push(MenuEntry::Action { action: StaticAction::ToggleWindow, label: "Hide/Show".into() });
        entries.push(MenuEntry::Action { action: StaticAction::Exit, label: "Exit".into() });
        Self { entries }
    }

    /// 스크랩한 이름을 반영한다. 매핑에 없는 항목은 이전 라벨 유지.
    /// 바뀐 라벨이 하나라도 있으면 true.
    pub fn update(&mut self, names: &HashMap<String, String>) -> bool {
        let mut changed = false;
        for entry in &mut self.entries {
            if let MenuEntry::Profile { profile, label } = entry {
                if let Some(name) = names.get(profile.dom_id()) {
                    if label.as_str() != name.as_str() {
                        *label = name.clone();
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    pub fn render(&self) -> Vec<MenuEntry> {
        self.entries.clone()
    }

    /// placeholder가 아닌 라벨이 하나라도 있는지
    pub fn has_loaded_names(&self) -> bool {
        self.entries.iter().any(|e| match e {
            MenuEntry::Profile { profile, label } => label != profile.placeholder(),
            _ => false,
        })
    }

    pub fn label_of(&self, profile: Profile) -> &str {
        self.entries
            .iter()
            .find_map(|e| match e {
                MenuEntry::Profile { profile: p, label } if *p == profile => Some(label.as_str()),
                _ => None,
            })
            .unwrap_or_else(|| profile.placeholder())
    }
}
