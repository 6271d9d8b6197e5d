//! Typed traversal over artefact trees.
//!
//! Each node kind accepts an [`ArtefactVisitor`] and calls exactly one of its
//! callbacks, passing a *focus* on the node. The focus exposes the node's data
//! and the navigation the visitor may choose to perform; nothing descends
//! automatically unless the visitor asks for it (the default callbacks visit
//! all children).
//!
//! Every callback returns [`ControlFlow`]. Returning `Break` stops the whole
//! traversal, which is how queries exit early once they have their answer.

use std::ops::ControlFlow;

use crate::artefact::{AggregateNode, Annotation, ArtefactTree, SourceCodeFile};

pub trait ArtefactVisitor: Sized {
    fn visit_aggregate(&mut self, focus: AggregateFocus<'_>) -> ControlFlow<()> {
        focus.visit_children(self)
    }

    fn visit_file(&mut self, focus: FileFocus<'_>) -> ControlFlow<()> {
        focus.visit_root(self)
    }

    fn visit_annotation(&mut self, focus: AnnotationFocus<'_>) -> ControlFlow<()> {
        focus.visit_children(self)
    }
}

impl ArtefactTree {
    pub fn accept<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        self.accept_at(visitor, 0)
    }

    fn accept_at<V: ArtefactVisitor>(&self, visitor: &mut V, depth: usize) -> ControlFlow<()> {
        match self {
            ArtefactTree::Aggregate(node) => visitor.visit_aggregate(AggregateFocus { node, depth }),
            ArtefactTree::File(file) => visitor.visit_file(FileFocus { file, depth }),
        }
    }
}

impl SourceCodeFile {
    pub fn accept<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        visitor.visit_file(FileFocus {
            file: self,
            depth: 0,
        })
    }
}

impl Annotation {
    pub fn accept<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        self.accept_at(visitor, 0)
    }

    fn accept_at<V: ArtefactVisitor>(&self, visitor: &mut V, depth: usize) -> ControlFlow<()> {
        visitor.visit_annotation(AnnotationFocus {
            annotation: self,
            depth,
        })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct AggregateFocus<'a> {
    node: &'a AggregateNode,
    depth: usize,
}

impl<'a> AggregateFocus<'a> {
    pub fn node(&self) -> &'a AggregateNode {
        self.node
    }

    /// Distance from the node the traversal started at.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn visit_child<V: ArtefactVisitor>(&self, index: usize, visitor: &mut V) -> ControlFlow<()> {
        match self.node.children().get(index) {
            Some(child) => child.accept_at(visitor, self.depth + 1),
            None => ControlFlow::Continue(()),
        }
    }

    pub fn visit_children<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        for child in self.node.children() {
            child.accept_at(visitor, self.depth + 1)?;
        }
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct FileFocus<'a> {
    file: &'a SourceCodeFile,
    depth: usize,
}

impl<'a> FileFocus<'a> {
    pub fn file(&self) -> &'a SourceCodeFile {
        self.file
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Visits the root annotation, the file's only child.
    pub fn visit_root<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        self.file.root().accept_at(visitor, self.depth + 1)
    }

    /// Visits the children of the root annotation, skipping the root itself.
    pub fn skip_root_and_visit_children<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        for child in self.file.root().children() {
            child.accept_at(visitor, self.depth + 1)?;
        }
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct AnnotationFocus<'a> {
    annotation: &'a Annotation,
    depth: usize,
}

impl<'a> AnnotationFocus<'a> {
    pub fn annotation(&self) -> &'a Annotation {
        self.annotation
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn visit_child<V: ArtefactVisitor>(&self, index: usize, visitor: &mut V) -> ControlFlow<()> {
        match self.annotation.children().get(index) {
            Some(child) => child.accept_at(visitor, self.depth + 1),
            None => ControlFlow::Continue(()),
        }
    }

    pub fn visit_children<V: ArtefactVisitor>(&self, visitor: &mut V) -> ControlFlow<()> {
        for child in self.annotation.children() {
            child.accept_at(visitor, self.depth + 1)?;
        }
        ControlFlow::Continue(())
    }
}
