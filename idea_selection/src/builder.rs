pub use crate::config::*;
use crate::session::SessionStateMachine;

/// A builder for setting up a session.
///
/// It collects the ideas before the session is opened, and returns a session that is
/// collecting ideas and already holds them.
///
/// ```
/// pub use idea_selection::builder::Builder;
/// pub use idea_selection::SessionRules;
/// # use idea_selection::SelectionErrors;
///
/// let mut builder = Builder::new(&SessionRules::DEFAULT_RULES)?
///     .ideas(&[("idea1".to_string(), "More plants".to_string(), "anna".to_string())])?;
///
/// builder.add_idea("idea2", "Fewer meetings", "bob")?;
/// builder.add_idea("idea3", "Later stand-up", "clara")?;
///
/// let mut session = builder.build()?;
/// session.start_voting()?;
///
/// # Ok::<(), SelectionErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: SessionRules,
    pub(crate) _ideas: Vec<Idea>,
}

impl Builder {
    pub fn new(rules: &SessionRules) -> Result<Builder, SelectionErrors> {
        rules.validate()?;
        Ok(Builder {
            _rules: rules.clone(),
            _ideas: Vec::new(),
        })
    }

    /// Replaces the ideas with the given (id, content, author id) triples.
    pub fn ideas(self, ideas: &[(String, String, String)]) -> Result<Builder, SelectionErrors> {
        let mut res = Builder {
            _rules: self._rules,
            _ideas: Vec::new(),
        };
        for (id, content, author_id) in ideas.iter() {
            res.add_idea(id, content, author_id)?;
        }
        Ok(res)
    }

    /// Adds one idea. Ids must be unique.
    pub fn add_idea(
        &mut self,
        id: &str,
        content: &str,
        author_id: &str,
    ) -> Result<(), SelectionErrors> {
        self.add_idea_2(&Idea::new(id, content, author_id))
    }

    pub fn add_idea_2(&mut self, idea: &Idea) -> Result<(), SelectionErrors> {
        if self._ideas.iter().any(|i| i.id == idea.id) {
            return Err(SelectionErrors::DuplicateIdea(idea.id.clone()));
        }
        self._ideas.push(idea.clone());
        Ok(())
    }

    /// An open session holding all the ideas added so far.
    pub fn build(&self) -> Result<SessionStateMachine, SelectionErrors> {
        let mut session = SessionStateMachine::new(&self._rules)?;
        session.open()?;
        for idea in self._ideas.iter() {
            session.submit_idea(idea)?;
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_an_open_session() {
        let mut builder = Builder::new(&SessionRules::DEFAULT_RULES).unwrap();
        builder.add_idea("idea1", "a", "anna").unwrap();
        builder.add_idea("idea2", "b", "anna").unwrap();
        let session = builder.build().unwrap();
        assert_eq!(session.status(), SessionStatus::CollectingIdeas);
        assert_eq!(session.ideas().len(), 2);
    }

    #[test]
    fn ideas_replace_previous_ones() {
        let mut builder = Builder::new(&SessionRules::DEFAULT_RULES).unwrap();
        builder.add_idea("old", "a", "anna").unwrap();
        let builder = builder
            .ideas(&[("new".to_string(), "b".to_string(), "bob".to_string())])
            .unwrap();
        let session = builder.build().unwrap();
        let ids: Vec<&str> = session.ideas().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[test]
    fn duplicate_ids() {
        let mut builder = Builder::new(&SessionRules::DEFAULT_RULES).unwrap();
        builder.add_idea("idea1", "a", "anna").unwrap();
        assert_eq!(
            builder.add_idea("idea1", "b", "bob"),
            Err(SelectionErrors::DuplicateIdea("idea1".to_string()))
        );
    }
}
