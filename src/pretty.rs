//! Indented text rendering of artefact trees.
//!
//! ```text
//! aggregate
//!   src/main.c <Base>
//!     #if Base @1
//!       #if F @2
//!         #if F && G @4
//!         #endif @6
//!       #endif @9
//!     #endif @10
//! ```

use std::fmt::Write;
use std::ops::ControlFlow;

use crate::artefact::{Annotation, ArtefactTree, SourceCodeFile};
use crate::visitor::{AggregateFocus, AnnotationFocus, ArtefactVisitor, FileFocus};

#[derive(Debug, Clone)]
pub struct PrettyPrinter {
    indent: &'static str,
    out: String,
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self {
            indent: "  ",
            out: String::new(),
        }
    }
}

impl PrettyPrinter {
    pub fn with_indent(mut self, indent: &'static str) -> Self {
        self.indent = indent;
        self
    }

    pub fn print(mut self, tree: &ArtefactTree) -> String {
        let _ = tree.accept(&mut self);
        self.out
    }

    pub fn print_file(mut self, file: &SourceCodeFile) -> String {
        let _ = file.accept(&mut self);
        self.out
    }

    pub fn print_annotation(mut self, annotation: &Annotation) -> String {
        let _ = annotation.accept(&mut self);
        self.out
    }

    fn line(&mut self, depth: usize, args: std::fmt::Arguments<'_>) {
        for _ in 0..depth {
            self.out.push_str(self.indent);
        }
        // Writing into a `String` cannot fail.
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }
}

impl ArtefactVisitor for PrettyPrinter {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        let condition = focus.node().condition();
        if condition.is_true() {
            self.line(focus.depth(), format_args!("aggregate"));
        } else {
            self.line(focus.depth(), format_args!("aggregate <{}>", condition));
        }
        focus.visit_children(self)
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        let file = focus.file();
        self.line(
            focus.depth(),
            format_args!("{} <{}>", file.path().display(), file.condition()),
        );
        focus.visit_root(self)
    }

    fn visit_annotation(&mut self, focus: AnnotationFocus<'_>) -> ControlFlow<()> {
        let annotation = focus.annotation();
        self.line(
            focus.depth(),
            format_args!("#if {} @{}", annotation.condition(), annotation.from()),
        );
        focus.visit_children(self)?;
        self.line(focus.depth(), format_args!("#endif @{}", annotation.to()));
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::artefact::{AggregateNode, AnnotationStyle};
    use crate::formula::Formula;

    #[test]
    fn test_print_tree() {
        let pc = |text: &str| Formula::parse(text).unwrap();
        let b = Annotation::new(pc("F && G"), 4, 6, AnnotationStyle::Internal).unwrap();
        let a = Annotation::new(pc("F"), 2, 9, AnnotationStyle::Internal)
            .unwrap()
            .with_children([b])
            .unwrap();
        let root = Annotation::new(pc("Base"), 1, 10, AnnotationStyle::External)
            .unwrap()
            .with_children([a])
            .unwrap();
        let tree: ArtefactTree = AggregateNode::new()
            .with_child(SourceCodeFile::new("src/main.c", pc("Base"), root))
            .into();

        let expected = "\
aggregate
  src/main.c <Base>
    #if Base @1
      #if F @2
        #if F && G @4
        #endif @6
      #endif @9
    #endif @10
";
        assert_eq!(PrettyPrinter::default().print(&tree), expected);
    }

    #[test]
    fn test_print_annotation_with_custom_indent() {
        let root = Annotation::new(Formula::True, 1, 3, AnnotationStyle::External)
            .unwrap()
            .with_children([Annotation::new(Formula::var("X"), 1, 3, AnnotationStyle::Internal).unwrap()])
            .unwrap();
        let text = PrettyPrinter::default().with_indent("\t").print_annotation(&root);
        assert_eq!(text, "#if 1 @1\n\t#if X @1\n\t#endif @3\n#endif @3\n");
    }
}
