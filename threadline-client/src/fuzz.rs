#![cfg(test)]

use std::{cmp, ops::RangeTo};

use chrono::Utc;

use crate::{
    api::{CommentId, PostId},
    CommentNode, StoreError, ThreadConfig, ThreadStore,
};

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    Reply {
        parent: Option<usize>,
        #[generator(bolero::generator::gen_with::<String>().len(0..8usize))]
        content: String,
    },
    ReplyToMissing,
    Edit {
        target: usize,
        #[generator(bolero::generator::gen_with::<String>().len(0..8usize))]
        content: String,
    },
    Delete {
        target: usize,
    },
    DeleteMissing,
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end);
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1))
}

struct Fuzzer {
    store: ThreadStore,
    ids: Vec<CommentId>,
}

impl Fuzzer {
    fn new(max_depth: usize) -> Fuzzer {
        let config = ThreadConfig {
            max_depth,
            ..ThreadConfig::default()
        };
        Fuzzer {
            store: ThreadStore::new(PostId(String::from("42")), &config),
            ids: Vec::new(),
        }
    }

    fn pick(&self, fuzz_id: usize) -> Option<CommentId> {
        resize_int(fuzz_id, ..self.ids.len()).map(|i| self.ids[i].clone())
    }

    fn apply(&mut self, op: FuzzOp) -> Result<(), StoreError> {
        match op {
            FuzzOp::Reply { parent, content } => {
                let nominal = parent.and_then(|p| self.pick(p));
                let id = CommentId(self.ids.len().to_string());
                let mut n = CommentNode::new(
                    id.clone(),
                    self.store.post_id().clone(),
                    nominal.clone(),
                    String::from("Alice"),
                    content,
                    Utc::now(),
                )?;
                n.parent_id = self.store.placement_for(nominal.as_ref())?;
                self.store.insert(n)?;
                self.ids.push(id);
                Ok(())
            }
            FuzzOp::ReplyToMissing => {
                let n = CommentNode::new(
                    CommentId(String::from("missing reply")),
                    self.store.post_id().clone(),
                    Some(CommentId(String::from("missing"))),
                    String::from("Alice"),
                    String::from("hello"),
                    Utc::now(),
                )?;
                self.store.insert(n)
            }
            FuzzOp::Edit { target, content } => match self.pick(target) {
                Some(id) => self.store.replace_content(&id, content),
                None => Ok(()),
            },
            FuzzOp::Delete { target } => match self.pick(target) {
                Some(id) => {
                    self.store.tombstone(&id)?;
                    let once = self.store.clone();
                    self.store.tombstone(&id)?;
                    assert_eq!(once, self.store, "tombstoning twice changed the store");
                    Ok(())
                }
                None => Ok(()),
            },
            FuzzOp::DeleteMissing => self.store.tombstone(&CommentId(String::from("missing"))),
        }
    }

    fn check_invariants(&self) {
        let s = &self.store;
        let mut seen = 0;
        for (depth, n) in s.iter_preorder() {
            seen += 1;
            assert!(depth <= s.max_depth(), "{} is at depth {depth}", n.id);
            assert_eq!(s.depth_of(&n.id), Ok(depth));
            assert_eq!(depth == 0, n.parent_id.is_none());
            for c in &n.children {
                assert_eq!(s.find(c).and_then(|c| c.parent_id.as_ref()), Some(&n.id));
            }
        }
        assert_eq!(seen, s.len(), "some comments are unreachable");
    }
}

#[test]
fn store_keeps_a_capped_forest() {
    bolero::check!()
        .with_type::<(u8, Vec<FuzzOp>)>()
        .cloned()
        .for_each(|(max_depth, ops)| {
            let mut fuzzer = Fuzzer::new(usize::from(max_depth % 4));
            for op in ops {
                let before = fuzzer.store.clone();
                if fuzzer.apply(op.clone()).is_err() {
                    assert_eq!(before, fuzzer.store, "failed {op:?} changed the store");
                }
                fuzzer.check_invariants();
            }
        })
}
