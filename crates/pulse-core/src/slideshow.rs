use crate::models::DailyEdition;
use crate::read_tracker::ReadTracker;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slide {
    Cover,
    Article(usize),
    Feedback,
}

/// Cover, one slide per article, then the feedback slide
pub fn slide_count(edition: &DailyEdition) -> usize {
    edition.articles.len() + 2
}

pub fn slide_at(edition: &DailyEdition, index: usize) -> Option<Slide> {
    let articles = edition.articles.len();
    match index {
        0 => Some(Slide::Cover),
        i if i <= articles => Some(Slide::Article(i - 1)),
        i if i == articles + 1 => Some(Slide::Feedback),
        _ => None,
    }
}

/// `round(scroll_left / slide_width)`, or `None` before layout gives the slide a width
pub fn active_slide_index(scroll_left: f32, slide_width: f32) -> Option<usize> {
    if slide_width <= 0.0 || !slide_width.is_finite() || !scroll_left.is_finite() {
        return None;
    }
    Some((scroll_left / slide_width).round().max(0.0) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideTransition {
    pub from: usize,
    pub to: usize,
    pub slide: Slide,
}

/// Active slide of one edition's horizontal slideshow
pub struct SlideTracker<'a> {
    edition: &'a DailyEdition,
    active: usize,
}

impl<'a> SlideTracker<'a> {
    pub fn new(edition: &'a DailyEdition) -> Self {
        Self { edition, active: 0 }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_slide(&self) -> Option<Slide> {
        slide_at(self.edition, self.active)
    }

    /// Update from a scroll event. Moving past the cover marks the edition
    /// read, keyed on the edition id.
    pub fn on_scroll<S: KeyValueStore>(
        &mut self,
        scroll_left: f32,
        slide_width: f32,
        reads: &ReadTracker<S>,
    ) -> Option<SlideTransition> {
        let last = slide_count(self.edition) - 1;
        let index = active_slide_index(scroll_left, slide_width)?.min(last);
        if index == self.active {
            return None;
        }

        let transition = SlideTransition {
            from: self.active,
            to: index,
            slide: slide_at(self.edition, index)?,
        };
        self.active = index;

        if transition.slide != Slide::Cover {
            reads.mark_as_read(&self.edition.id);
        }
        Some(transition)
    }
}
