//! DRM profile selector - a circular cursor over the profile catalog

use crate::error::{Error, Result};
use crate::types::DrmProfile;

/// Cursor movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Ring cursor over a non-empty list of profiles
#[derive(Debug, Clone)]
pub struct DrmSelector {
    profiles: Vec<DrmProfile>,
    index: usize,
}

impl DrmSelector {
    /// Create a selector positioned on the first profile
    pub fn new(profiles: Vec<DrmProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(Error::InvalidConfig("DRM profile list is empty".into()));
        }
        Ok(Self { profiles, index: 0 })
    }

    /// Move one position, wrapping at both ends, and return the new selection
    pub fn advance(&mut self, direction: Direction) -> &DrmProfile {
        let len = self.profiles.len();
        self.index = match direction {
            Direction::Up => (self.index + len - 1) % len,
            Direction::Down => (self.index + 1) % len,
        };
        &self.profiles[self.index]
    }

    /// Jump to a profile by name, case-insensitive
    pub fn select_by_name(&mut self, name: &str) -> Option<&DrmProfile> {
        let index = self.profiles.iter().position(|p| p.name.eq_ignore_ascii_case(name))?;
        self.index = index;
        Some(&self.profiles[index])
    }

    pub fn current(&self) -> &DrmProfile {
        &self.profiles[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always false; construction rejects empty lists
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profiles(&self) -> &[DrmProfile] {
        &self.profiles
    }
}
