//! Second pipeline stage: global resolution over every scanned package.
//!
//! The resolver checks the types of all scanned packages together. Struct
//! fields whose types belong to packages outside the scan path are
//! dropped, named types that point at aliases are substituted (the field
//! `Foo IntList` where `type IntList []int` becomes a repeated basic
//! `int`), and structs are marked for generation by reachability.

use std::collections::{BTreeMap, HashMap, HashSet};

use proteus_report::warn;
use proteus_scanner::{Func, Package, Struct, Type, TypeKind};

/// Checks the types of all scanned packages, excludes what cannot be
/// resolved and substitutes aliases with their targets.
pub struct Resolver {
    custom_types: HashSet<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// A resolver with the default custom types registered: `time.Time`,
    /// `time.Duration` and `error` are considered correct even though
    /// their packages are never scanned.
    pub fn new() -> Self {
        let mut custom_types = HashSet::new();
        custom_types.insert("time.Time".to_string());
        custom_types.insert("time.Duration".to_string());
        custom_types.insert("error".to_string());
        Resolver { custom_types }
    }

    /// Extend the allow-list with another qualified type name.
    pub fn with_custom_type(mut self, name: impl Into<String>) -> Self {
        self.custom_types.insert(name.into());
        self
    }

    /// Resolve all packages in place. Afterwards every package has its
    /// `resolved` flag set and can be transformed safely.
    pub fn resolve(&self, pkgs: &mut [Package]) {
        let mut info = PackagesInfo::gather(pkgs);

        for pkg in pkgs.iter_mut() {
            self.resolve_package(pkg, &mut info);
        }
    }

    fn resolve_package(&self, pkg: &mut Package, info: &mut PackagesInfo) {
        for st in &mut pkg.structs {
            self.resolve_struct(st, info);
        }

        let funcs = std::mem::take(&mut pkg.funcs);
        pkg.funcs = funcs
            .into_iter()
            .filter_map(|f| self.resolve_func(f, info))
            .collect();

        self.remove_unmarked_structs(pkg, info);
        pkg.resolved = true;
    }

    fn resolve_func(&self, mut func: Func, info: &mut PackagesInfo) -> Option<Func> {
        let input = self.resolve_type_list(std::mem::take(&mut func.input), info);
        let output = self.resolve_type_list(std::mem::take(&mut func.output), info);

        match (input, output) {
            (Some(input), Some(output)) => {
                func.input = input;
                func.output = output;
                Some(func)
            }
            _ => {
                warn!(
                    "func {} had an unresolvable type and it will not be generated",
                    func.name
                );
                None
            }
        }
    }

    fn resolve_type_list(
        &self,
        types: Vec<Type>,
        info: &mut PackagesInfo,
    ) -> Option<Vec<Type>> {
        let mut result = Vec::with_capacity(types.len());
        for t in types {
            result.push(self.resolve_type(t, info)?);
        }
        Some(result)
    }

    fn resolve_struct(&self, st: &mut Struct, info: &mut PackagesInfo) {
        let fields = std::mem::take(&mut st.fields);
        st.fields = fields
            .into_iter()
            .filter_map(|mut f| {
                let ty = self.resolve_type(f.ty, info)?;
                f.ty = ty;
                Some(f)
            })
            .collect();
    }

    fn remove_unmarked_structs(&self, pkg: &mut Package, info: &PackagesInfo) {
        let path = pkg.path.clone();
        pkg.structs
            .retain(|s| info.is_struct_marked(&format!("{}.{}", path, s.name)));
    }

    fn resolve_type(&self, typ: Type, info: &mut PackagesInfo) -> Option<Type> {
        match &typ.kind {
            TypeKind::Named { path, name } => {
                let qualified = typ.to_string();
                if self.custom_types.contains(&qualified) {
                    return Some(typ);
                }

                if !info.has_package(path) {
                    warn!(
                        "type \"{}\" of package {} will be ignored because it was not present on the scan path",
                        name, path
                    );
                    return None;
                }

                if let Some(alias) = info.alias_of(&qualified) {
                    if alias.is_repeated() {
                        warn!(
                            "type \"{}\" of package {} is an alias for {} that is marked as repeated. \
                             Alias for repeated fields are not currently supported, this field will be ignored.",
                            name, path, alias
                        );
                        return None;
                    }
                    return Some(Type::alias(typ, alias));
                }

                if info.is_struct(&qualified) {
                    info.mark_struct(&qualified);
                }

                Some(typ)
            }
            TypeKind::Basic(_) => Some(typ),
            TypeKind::Map { ref key, ref value } => {
                let key = self.resolve_type((**key).clone(), info)?;
                let value = self.resolve_type((**value).clone(), info)?;
                let mut map = Type::map(key, value);
                map.repeated = typ.repeated;
                map.nullable = typ.nullable;
                Some(map)
            }
            // Aliases only appear after resolution; pass them through.
            TypeKind::Alias { .. } => Some(typ),
        }
    }
}

/// Cross-package information gathered before any mutation: the scanned
/// paths, every alias that is not an enum, and the struct mark bits.
struct PackagesInfo {
    aliases: BTreeMap<String, Type>,
    packages: HashSet<String>,
    structs: HashMap<String, bool>,
}

impl PackagesInfo {
    fn gather(pkgs: &[Package]) -> Self {
        let mut info = PackagesInfo {
            aliases: BTreeMap::new(),
            packages: HashSet::new(),
            structs: HashMap::new(),
        };

        // Enums were promoted out of the alias tables already, but their
        // qualified names must never resolve as aliases.
        let mut enums = HashSet::new();
        for pkg in pkgs {
            for e in &pkg.enums {
                enums.insert(pkg.qualify(&e.name));
            }
        }

        for pkg in pkgs {
            info.packages.insert(pkg.path.clone());

            for (name, ty) in &pkg.aliases {
                if !enums.contains(name) {
                    info.aliases.insert(name.clone(), ty.clone());
                }
            }

            for s in &pkg.structs {
                info.structs.insert(pkg.qualify(&s.name), s.generate);
            }
        }

        info
    }

    fn alias_of(&self, qualified: &str) -> Option<Type> {
        self.aliases.get(qualified).cloned()
    }

    fn is_struct(&self, qualified: &str) -> bool {
        self.structs.contains_key(qualified)
    }

    fn mark_struct(&mut self, qualified: &str) {
        self.structs.insert(qualified.to_string(), true);
    }

    fn is_struct_marked(&self, qualified: &str) -> bool {
        self.structs.get(qualified).copied().unwrap_or(false)
    }

    fn has_package(&self, path: &str) -> bool {
        self.packages.contains(path)
    }
}
