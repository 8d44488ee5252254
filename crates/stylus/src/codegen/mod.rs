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

pub mod generator;
pub mod syntax;
pub mod templates;
pub use generator::{
    generate_class, generate_function, identify_patterns, CodeGenerator, GeneratedArtifact,
};
pub use syntax::{
    add_comments, canonical_language, extract_classes, extract_functions, find_dependencies,
    format_code, optimize_code, validate_syntax,
};
pub use templates::{
    builtin_templates, extract_variables, fill_template, CodeTemplate, TemplateRegistry,
};
