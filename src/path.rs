//! Compiled paths into tag trees.
//!
//! A path is a sequence of components:
//!
//! ```text
//! path      = component*
//! component = "/" name | "[" container? index "]"
//! container = "A" | "L"
//! index     = [1-9][0-9]*
//! ```
//!
//! Inside a name a backslash escapes `/`, `[` and itself; a trailing lone
//! backslash is kept as is. Indices count from 1. `/Level/Sections[L2]/Y`
//! reads the `Y` byte of the second section.

use crate::error::PathParseError;
use crate::tag::{CompoundTag, Tag};
use std::borrow::Cow;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Which containers an index component may descend into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Container {
    /// Byte, int or long array.
    Array,
    List,
    /// Any of the above.
    Unspecified,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Component {
    /// Member of a compound.
    Name(String),
    /// Element of an array or a list, counting from 1.
    Index { index: usize, container: Container },
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PathSpec {
    components: Vec<Component>,
}

impl PathSpec {
    /// Empty path, resolving to the root itself.
    pub fn root() -> Self {
        PathSpec::default()
    }

    /// Compiles a path, `None` unless the whole input is valid.
    pub fn compile(path: &str) -> Option<Self> {
        path.parse().ok()
    }

    pub fn child(mut self, name: &str) -> Self {
        self.components.push(Component::Name(name.to_owned()));
        self
    }

    pub fn index(mut self, index: usize, container: Container) -> Self {
        debug_assert!(index >= 1, "Path indices count from 1");

        self.components.push(Component::Index { index, container });
        self
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Replays the path against a tree.
    ///
    /// Missing members, kind mismatches and indices out of range yield `None`.
    /// Tags inside the tree are borrowed, array elements are returned as owned
    /// scalar tags. The empty path yields a copy of the root.
    pub fn query<'a>(&self, root: &'a CompoundTag) -> Option<Cow<'a, Tag>> {
        let mut components = self.components.iter();

        let mut current = match components.next() {
            None => return Some(Cow::Owned(Tag::Compound(root.clone()))),
            Some(Component::Name(name)) => Cow::Borrowed(root.get(name)?),
            Some(Component::Index { .. }) => return None,
        };

        for component in components {
            current = match current {
                Cow::Borrowed(tag) => descend(tag, component)?,
                // Array elements have nothing to descend into.
                Cow::Owned(_) => return None,
            };
        }

        Some(current)
    }
}

fn descend<'a>(tag: &'a Tag, component: &Component) -> Option<Cow<'a, Tag>> {
    match component {
        Component::Name(name) => tag.as_compound()?.get(name).map(Cow::Borrowed),
        Component::Index { index, container } => {
            let position = index.checked_sub(1)?;

            match (tag, container) {
                (Tag::List(list), Container::List) | (Tag::List(list), Container::Unspecified) => {
                    list.get(position).map(Cow::Borrowed)
                }
                (Tag::List(_), Container::Array) => None,
                (_, Container::List) => None,
                (Tag::ByteArray(values), _) => {
                    values.get(position).map(|value| Cow::Owned(Tag::Byte(*value)))
                }
                (Tag::IntArray(values), _) => {
                    values.get(position).map(|value| Cow::Owned(Tag::Int(*value)))
                }
                (Tag::LongArray(values), _) => {
                    values.get(position).map(|value| Cow::Owned(Tag::Long(*value)))
                }
                _ => None,
            }
        }
    }
}

impl FromStr for PathSpec {
    type Err = PathParseError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { path, position: 0 };
        let mut components = Vec::new();

        while let Some(component) = parser.component() {
            components.push(component);
        }

        if parser.position != path.len() {
            return Err(PathParseError {
                position: parser.position,
            });
        }

        Ok(PathSpec { components })
    }
}

impl Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            match component {
                Component::Name(name) => {
                    f.write_str("/")?;

                    for c in name.chars() {
                        if c == '/' || c == '[' || c == '\\' {
                            f.write_str("\\")?;
                        }

                        write!(f, "{}", c)?;
                    }
                }
                Component::Index { index, container } => {
                    let container = match container {
                        Container::Array => "A",
                        Container::List => "L",
                        Container::Unspecified => "",
                    };

                    write!(f, "[{}{}]", container, index)?;
                }
            }
        }

        Ok(())
    }
}

/// Recursive descent over the path text. A component which does not parse
/// leaves the position untouched.
struct Parser<'a> {
    path: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.path[self.position..]
    }

    fn component(&mut self) -> Option<Component> {
        self.name().or_else(|| self.index())
    }

    fn name(&mut self) -> Option<Component> {
        let rest = self.rest();

        if !rest.starts_with('/') {
            return None;
        }

        let mut name = String::new();
        let mut verbatim = false;
        let mut end = rest.len();

        for (offset, c) in rest.char_indices().skip(1) {
            if verbatim {
                name.push(c);
                verbatim = false;
            } else if c == '\\' {
                verbatim = true;
            } else if c == '/' || c == '[' {
                end = offset;
                break;
            } else {
                name.push(c);
            }
        }

        if verbatim {
            name.push('\\');
        }

        self.position += end;

        Some(Component::Name(name))
    }

    fn index(&mut self) -> Option<Component> {
        let rest = self.rest();
        let mut chars = rest.char_indices().peekable();

        match chars.next() {
            Some((_, '[')) => {}
            _ => return None,
        }

        let container = match chars.peek() {
            Some((_, 'A')) => Container::Array,
            Some((_, 'L')) => Container::List,
            _ => Container::Unspecified,
        };

        if container != Container::Unspecified {
            chars.next();
        }

        let mut index: usize = match chars.next() {
            Some((_, c @ '1'..='9')) => c as usize - '0' as usize,
            _ => return None,
        };

        while let Some(&(_, c)) = chars.peek() {
            let digit = match c.to_digit(10) {
                Some(digit) => digit as usize,
                None => break,
            };

            index = index.checked_mul(10)?.checked_add(digit)?;
            chars.next();
        }

        match chars.next() {
            Some((offset, ']')) => {
                self.position += offset + 1;
                Some(Component::Index { index, container })
            }
            _ => None,
        }
    }
}
