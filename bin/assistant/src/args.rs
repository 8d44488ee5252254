// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use std::path::PathBuf;
use stylus::StylusConfig;
pub const KNOWLEDGE_PATH_VAR: &str = "STYLUS_KNOWLEDGE_PATH";
pub const TEMPLATES_PATH_VAR: &str = "STYLUS_TEMPLATES_PATH";
/// Storage locations taken from the environment; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub knowledge_path: Option<PathBuf>,
    pub templates_path: Option<PathBuf>,
}
impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            knowledge_path: non_empty_var(KNOWLEDGE_PATH_VAR),
            templates_path: non_empty_var(TEMPLATES_PATH_VAR),
        }
    }
    pub fn apply(self, config: &mut StylusConfig) {
        if let Some(path) = self.knowledge_path {
            config.storage.knowledge_path = Some(path);
        }
        if let Some(path) = self.templates_path {
            config.storage.templates_path = Some(path);
        }
    }
}
fn non_empty_var(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
