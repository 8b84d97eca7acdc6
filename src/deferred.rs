use std::cell::RefCell;
use std::collections::VecDeque;

type Effect<C> = Box<dyn FnOnce(&mut C)>;

/// FIFO of effects to run after a render pass, one per pass.
///
/// `C` is whatever view context the effects act on. The queue uses interior
/// mutability so it can be shared with store listeners.
pub struct DeferredQueue<C> {
    effects: RefCell<VecDeque<Effect<C>>>,
}

impl<C> Default for DeferredQueue<C> {
    fn default() -> Self {
        Self {
            effects: RefCell::new(VecDeque::new()),
        }
    }
}

impl<C> DeferredQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&self, effect: impl FnOnce(&mut C) + 'static) {
        self.effects.borrow_mut().push_back(Box::new(effect));
    }

    /// Run the oldest queued effect, if any. Called once per completed
    /// render. The effect may queue further effects.
    pub fn run_next(&self, ctx: &mut C) -> bool {
        let next = self.effects.borrow_mut().pop_front();
        match next {
            Some(effect) => {
                effect(ctx);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.effects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.effects.borrow_mut().clear();
    }
}
