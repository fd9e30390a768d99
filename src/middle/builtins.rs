//! The immutable registry of everything a Boa program can name without
//! declaring it: primitive and domain types, enums, functions, aggregators and
//! the `input` global.

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use strum::IntoEnumIterator;

use super::{
    primitive::PrimitiveKind,
    ty::{Component, TupleType, Type},
};
use crate::{
    frontend::ast::CollectionKind,
    interchange::{CommentKind, ExpressionKind, ModifierKind, StatementKind, TypeKind, Visibility},
};

#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub parameters: Vec<Type>,
    pub return_type: Option<Type>,
}

impl BuiltinFunction {
    pub fn ty(&self) -> Type {
        Type::function(self.parameters.clone(), self.return_type.clone())
    }

    /// The return type of a call with `arguments`, with type variables
    /// substituted, or `None` if the arguments do not fit this signature
    fn call(&self, arguments: &[Type]) -> Option<Type> {
        if arguments.len() != self.parameters.len() {
            return None;
        }

        let mut bindings = HashMap::new();
        for (parameter, argument) in self.parameters.iter().zip(arguments) {
            if !unify(parameter, argument, &mut bindings) {
                return None;
            }
        }

        Some(match &self.return_type {
            Some(return_type) => substitute(return_type, &bindings),
            None => Type::Void,
        })
    }
}

fn unify(parameter: &Type, argument: &Type, bindings: &mut HashMap<&'static str, Type>) -> bool {
    match (parameter, argument) {
        (_, Type::TypeName(_)) => false,
        (_, Type::Error) => true,
        (Type::TypeVar(name), _) => match bindings.get(name) {
            Some(bound) => bound.accepts(argument),
            None => {
                bindings.insert(*name, argument.clone());
                true
            }
        },
        (Type::Array(parameter), Type::Array(argument)) => unify(parameter, argument, bindings),
        (Type::Map { key, value }, Type::Map { key: k, value: v }) => {
            unify(key, k, bindings) && unify(value, v, bindings)
        }
        (Type::Collection(kind, parameter), Type::Collection(other, argument)) => {
            kind == other && unify(parameter, argument, bindings)
        }
        _ => parameter.accepts(argument),
    }
}

fn substitute(ty: &Type, bindings: &HashMap<&'static str, Type>) -> Type {
    match ty {
        Type::TypeVar(name) => bindings.get(name).cloned().unwrap_or(Type::Any),
        Type::Array(element) => Type::array(substitute(element, bindings)),
        Type::Map { key, value } => {
            Type::map(substitute(key, bindings), substitute(value, bindings))
        }
        Type::Collection(kind, element) => Type::collection(*kind, substitute(element, bindings)),
        other => other.clone(),
    }
}

#[derive(Debug)]
pub struct Builtins {
    protos: HashMap<&'static str, TupleType>,
    enums: HashMap<&'static str, Vec<&'static str>>,
    functions: HashMap<&'static str, Vec<BuiltinFunction>>,
    aggregators: HashSet<&'static str>,
    globals: Vec<(&'static str, Type)>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

impl Builtins {
    pub fn standard() -> Self {
        let mut builtins = Self {
            protos: HashMap::new(),
            enums: HashMap::new(),
            functions: HashMap::new(),
            aggregators: [
                "sum",
                "top",
                "bottom",
                "maximum",
                "minimum",
                "collection",
                "mean",
                "set",
                "stdev",
                "quantile",
                "kurtosis",
                "skewness",
                "histogram",
                "median",
                "unique",
                "graphcsv",
            ]
            .into_iter()
            .collect(),
            globals: vec![("input", Type::Proto("Project"))],
        };

        builtins.register_enums();
        builtins.register_protos();
        builtins.register_functions();
        builtins
    }

    pub fn proto(&self, name: &str) -> Option<&TupleType> {
        self.protos.get(name)
    }

    /// Resolves a type name: primitives first, then domain tuples and enums
    pub fn named_type(&self, name: &str) -> Option<Type> {
        if name == "any" {
            return Some(Type::Any);
        }
        if let Ok(primitive) = name.parse::<PrimitiveKind>() {
            return Some(Type::Primitive(primitive));
        }
        if let Some((name, _)) = self.protos.get_key_value(name) {
            return Some(Type::Proto(*name));
        }
        self.enums
            .get_key_value(name)
            .map(|(name, _)| Type::Enum(*name))
    }

    pub fn enum_member(&self, enumeration: &str, member: &str) -> bool {
        self.enums
            .get(enumeration)
            .is_some_and(|members| members.iter().any(|candidate| *candidate == member))
    }

    pub fn is_aggregator(&self, name: &str) -> bool {
        self.aggregators.contains(name)
    }

    pub fn globals(&self) -> &[(&'static str, Type)] {
        &self.globals
    }

    /// The type of a builtin function used as a value. Overloaded functions
    /// take the type of their first signature.
    pub fn function_type(&self, name: &str) -> Option<Type> {
        self.functions.get(name)?.first().map(BuiltinFunction::ty)
    }

    /// Picks the first overload of `name` accepting `arguments` and returns its
    /// return type, or [`Type::Void`] if it has none
    pub fn resolve_function(&self, name: &str, arguments: &[Type]) -> Option<Type> {
        self.functions
            .get(name)?
            .iter()
            .find_map(|function| function.call(arguments))
    }

    fn register_enums(&mut self) {
        fn names<E: IntoEnumIterator + Into<&'static str>>() -> Vec<&'static str> {
            E::iter().map(Into::into).collect()
        }

        self.enums.extend([
            (
                "ChangeKind",
                vec!["UNKNOWN", "ADDED", "DELETED", "MODIFIED", "RENAMED", "COPIED", "MERGED"],
            ),
            (
                "FileKind",
                vec![
                    "UNKNOWN",
                    "BINARY",
                    "TEXT",
                    "XML",
                    "SOURCE_JAVA_ERROR",
                    "SOURCE_JAVA_JLS2",
                    "SOURCE_JAVA_JLS3",
                    "SOURCE_JAVA_JLS4",
                    "SOURCE_JAVA_JLS8",
                    "SOURCE_JS_ERROR",
                    "SOURCE_JS",
                    "OTHER",
                ],
            ),
            (
                "RepositoryKind",
                vec!["UNKNOWN", "SVN", "CVS", "GIT", "HG", "BZR", "OTHER"],
            ),
            ("StatementKind", names::<StatementKind>()),
            ("ExpressionKind", names::<ExpressionKind>()),
            ("TypeKind", names::<TypeKind>()),
            ("CommentKind", names::<CommentKind>()),
            ("ModifierKind", names::<ModifierKind>()),
            ("Visibility", names::<Visibility>()),
        ]);
    }

    fn register_protos(&mut self) {
        use Type as T;

        let strings = || T::array(T::STRING);
        let many = |name: &'static str| T::array(T::Proto(name));

        let protos: [(&'static str, Vec<(&'static str, Type)>); 15] = [
            (
                "Project",
                vec![
                    ("id", T::STRING),
                    ("name", T::STRING),
                    ("project_url", T::STRING),
                    ("homepage_url", T::STRING),
                    ("created_date", T::TIME),
                    ("description", T::STRING),
                    ("operating_systems", strings()),
                    ("programming_languages", strings()),
                    ("databases", strings()),
                    ("licenses", strings()),
                    ("interfaces", strings()),
                    ("audiences", strings()),
                    ("topics", strings()),
                    ("status", strings()),
                    ("maintainers", many("Person")),
                    ("developers", many("Person")),
                    ("code_repositories", many("CodeRepository")),
                ],
            ),
            (
                "CodeRepository",
                vec![
                    ("url", T::STRING),
                    ("kind", T::Enum("RepositoryKind")),
                    ("revisions", many("Revision")),
                ],
            ),
            (
                "Revision",
                vec![
                    ("id", T::STRING),
                    ("author", T::Proto("Person")),
                    ("committer", T::Proto("Person")),
                    ("commit_date", T::TIME),
                    ("log", T::STRING),
                    ("files", many("ChangedFile")),
                    ("parents", strings()),
                ],
            ),
            (
                "ChangedFile",
                vec![
                    ("change", T::Enum("ChangeKind")),
                    ("kind", T::Enum("FileKind")),
                    ("name", T::STRING),
                    ("key", T::STRING),
                    ("ast", T::BOOL),
                    ("changes", T::array(T::Enum("ChangeKind"))),
                    ("previous_names", strings()),
                    ("previous_versions", T::array(T::INT)),
                ],
            ),
            (
                "Person",
                vec![
                    ("username", T::STRING),
                    ("real_name", T::STRING),
                    ("email", T::STRING),
                ],
            ),
            (
                "ASTRoot",
                vec![("namespaces", many("Namespace")), ("imports", strings())],
            ),
            (
                "Namespace",
                vec![
                    ("name", T::STRING),
                    ("modifiers", many("Modifier")),
                    ("declarations", many("Declaration")),
                    ("statements", many("Statement")),
                    ("expressions", many("Expression")),
                ],
            ),
            (
                "Declaration",
                vec![
                    ("name", T::STRING),
                    ("kind", T::Enum("TypeKind")),
                    ("modifiers", many("Modifier")),
                    ("generic_parameters", many("Type")),
                    ("parents", many("Type")),
                    ("fields", many("Variable")),
                    ("methods", many("Method")),
                    ("nested_declarations", many("Declaration")),
                    ("comments", many("Comment")),
                ],
            ),
            (
                "Method",
                vec![
                    ("name", T::STRING),
                    ("modifiers", many("Modifier")),
                    ("return_type", T::Proto("Type")),
                    ("generic_parameters", many("Type")),
                    ("arguments", many("Variable")),
                    ("exception_types", many("Type")),
                    ("statements", many("Statement")),
                    ("comments", many("Comment")),
                ],
            ),
            (
                "Variable",
                vec![
                    ("name", T::STRING),
                    ("variable_type", T::Proto("Type")),
                    ("modifiers", many("Modifier")),
                    ("initializer", T::Proto("Expression")),
                    ("comments", many("Comment")),
                ],
            ),
            (
                "Type",
                vec![
                    ("name", T::STRING),
                    ("kind", T::Enum("TypeKind")),
                    ("id", T::STRING),
                ],
            ),
            (
                "Statement",
                vec![
                    ("kind", T::Enum("StatementKind")),
                    ("comments", many("Comment")),
                    ("statements", many("Statement")),
                    ("initializations", many("Expression")),
                    ("condition", T::Proto("Expression")),
                    ("updates", many("Expression")),
                    ("variable_declaration", T::Proto("Variable")),
                    ("type_declaration", T::Proto("Declaration")),
                    ("expressions", many("Expression")),
                ],
            ),
            (
                "Expression",
                vec![
                    ("kind", T::Enum("ExpressionKind")),
                    ("expressions", many("Expression")),
                    ("variable_decls", many("Variable")),
                    ("new_type", T::Proto("Type")),
                    ("generic_parameters", many("Type")),
                    ("is_postfix", T::BOOL),
                    ("literal", T::STRING),
                    ("variable", T::STRING),
                    ("method", T::STRING),
                    ("method_args", many("Expression")),
                    ("anon_declaration", T::Proto("Declaration")),
                ],
            ),
            (
                "Modifier",
                vec![
                    ("kind", T::Enum("ModifierKind")),
                    ("visibility", T::Enum("Visibility")),
                    ("annotation_name", T::STRING),
                    ("annotation_members", strings()),
                    ("annotation_values", many("Expression")),
                    ("other", T::STRING),
                ],
            ),
            (
                "Comment",
                vec![
                    ("kind", T::Enum("CommentKind")),
                    ("value", T::STRING),
                    ("start_line", T::INT),
                ],
            ),
        ];

        self.protos.extend(protos.into_iter().map(|(name, members)| {
            let components = members
                .into_iter()
                .map(|(member, ty)| Component::named(member, ty))
                .collect_vec();
            (name, TupleType::new(components))
        }));
    }

    fn register_functions(&mut self) {
        use Type as T;

        let t = || T::TypeVar("T");
        let k = || T::TypeVar("K");
        let v = || T::TypeVar("V");
        let stack = || T::collection(CollectionKind::Stack, t());
        let set = || T::collection(CollectionKind::Set, t());
        let queue = || T::collection(CollectionKind::Queue, t());
        let map = || T::map(k(), v());

        let signatures: Vec<(&'static str, Vec<Type>, Option<Type>)> = vec![
            ("len", vec![T::Any], Some(T::INT)),
            ("def", vec![T::Any], Some(T::BOOL)),
            ("string", vec![T::Any], Some(T::STRING)),
            ("int", vec![T::Any], Some(T::INT)),
            ("float", vec![T::Any], Some(T::FLOAT)),
            ("bool", vec![T::Any], Some(T::BOOL)),
            ("now", vec![], Some(T::TIME)),
            ("yearof", vec![T::TIME], Some(T::INT)),
            ("monthof", vec![T::TIME], Some(T::INT)),
            ("dayofmonth", vec![T::TIME], Some(T::INT)),
            ("dayofweek", vec![T::TIME], Some(T::INT)),
            ("abs", vec![T::INT], Some(T::INT)),
            ("abs", vec![T::FLOAT], Some(T::FLOAT)),
            ("max", vec![T::INT, T::INT], Some(T::INT)),
            ("max", vec![T::FLOAT, T::FLOAT], Some(T::FLOAT)),
            ("min", vec![T::INT, T::INT], Some(T::INT)),
            ("min", vec![T::FLOAT, T::FLOAT], Some(T::FLOAT)),
            ("lowercase", vec![T::STRING], Some(T::STRING)),
            ("uppercase", vec![T::STRING], Some(T::STRING)),
            ("trim", vec![T::STRING], Some(T::STRING)),
            ("strfind", vec![T::STRING, T::STRING], Some(T::INT)),
            ("match", vec![T::STRING, T::STRING], Some(T::BOOL)),
            ("substring", vec![T::STRING, T::INT], Some(T::STRING)),
            ("substring", vec![T::STRING, T::INT, T::INT], Some(T::STRING)),
            ("splitall", vec![T::STRING, T::STRING], Some(T::array(T::STRING))),
            ("push", vec![stack(), t()], None),
            ("pop", vec![stack()], Some(t())),
            ("peek", vec![stack()], Some(t())),
            ("add", vec![set(), t()], None),
            ("contains", vec![set(), t()], Some(T::BOOL)),
            ("remove", vec![set(), t()], None),
            ("remove", vec![map(), k()], None),
            ("offer", vec![queue(), t()], None),
            ("poll", vec![queue()], Some(t())),
            ("clear", vec![stack()], None),
            ("clear", vec![set()], None),
            ("clear", vec![queue()], None),
            ("clear", vec![map()], None),
            ("haskey", vec![map(), k()], Some(T::BOOL)),
            ("keys", vec![map()], Some(T::array(k()))),
            ("values", vec![map()], Some(T::array(v()))),
            ("sort", vec![T::array(t())], Some(T::array(t()))),
            ("visit", vec![T::Any, T::Visitor], None),
            (
                "getast",
                vec![T::Proto("ChangedFile")],
                Some(T::Proto("ASTRoot")),
            ),
            (
                "getsnapshot",
                vec![T::Proto("CodeRepository")],
                Some(T::array(T::Proto("ChangedFile"))),
            ),
            (
                "getsnapshot",
                vec![T::Proto("CodeRepository"), T::TIME],
                Some(T::array(T::Proto("ChangedFile"))),
            ),
            (
                "isfixingrevision",
                vec![T::Proto("Revision")],
                Some(T::BOOL),
            ),
        ];

        for (name, parameters, return_type) in signatures {
            self.functions
                .entry(name)
                .or_default()
                .push(BuiltinFunction {
                    name,
                    parameters,
                    return_type,
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn named_types() {
        let builtins = Builtins::standard();

        assert_eq!(builtins.named_type("int"), Some(Type::INT));
        assert_eq!(builtins.named_type("Project"), Some(Type::Proto("Project")));
        assert_eq!(builtins.named_type("ChangeKind"), Some(Type::Enum("ChangeKind")));
        assert_eq!(builtins.named_type("input"), None);
    }

    #[test]
    fn enums_follow_interchange_names() {
        let builtins = Builtins::standard();

        assert!(builtins.enum_member("ExpressionKind", "METHODCALL"));
        assert!(builtins.enum_member("StatementKind", "TYPEDECL"));
        assert!(builtins.enum_member("ChangeKind", "ADDED"));
        assert!(!builtins.enum_member("ChangeKind", "SOURCE_JAVA_JLS2"));
    }

    #[test]
    fn proto_members() {
        let builtins = Builtins::standard();
        let project = Type::Proto("Project");

        assert_eq!(
            project.member("code_repositories", &builtins),
            Ok(Type::array(Type::Proto("CodeRepository")))
        );
        assert_eq!(
            project
                .member("repositories", &builtins)
                .unwrap_err()
                .to_string(),
            "'Project' has no member named 'repositories'"
        );
    }

    #[test]
    fn generic_functions_unify() {
        let builtins = Builtins::standard();
        let ints = Type::collection(CollectionKind::Stack, Type::INT);

        assert_eq!(
            builtins.resolve_function("pop", std::slice::from_ref(&ints)),
            Some(Type::INT)
        );
        assert_eq!(
            builtins.resolve_function("push", &[ints.clone(), Type::INT]),
            Some(Type::Void)
        );
        assert_eq!(builtins.resolve_function("push", &[ints.clone(), ints]), None);
        assert_eq!(
            builtins.resolve_function(
                "keys",
                &[Type::map(Type::STRING, Type::INT)]
            ),
            Some(Type::array(Type::STRING))
        );
    }

    #[test]
    fn overloads() {
        let builtins = Builtins::standard();

        assert_eq!(
            builtins.resolve_function("max", &[Type::INT, Type::INT]),
            Some(Type::INT)
        );
        assert_eq!(
            builtins.resolve_function("max", &[Type::INT, Type::FLOAT]),
            Some(Type::FLOAT)
        );
        assert_eq!(builtins.resolve_function("max", &[Type::STRING]), None);
        assert_eq!(
            builtins.resolve_function("len", &[Type::TypeName(Box::new(Type::INT))]),
            None
        );
        assert_eq!(
            builtins.function_type("max"),
            Some(Type::function(vec![Type::INT, Type::INT], Some(Type::INT)))
        );
        assert_eq!(
            builtins.function_type("now"),
            Some(Type::function(vec![], Some(Type::TIME)))
        );
    }
}
