use super::particle::Particle;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("Primary count {primaries} exceeds the number of tracks {tracks}")]
    TooManyPrimaries { primaries: usize, tracks: usize },
    #[error("Particle {index} refers to {link} {target}, which is outside the stack of {tracks} tracks")]
    DanglingLink {
        index: usize,
        link: &'static str,
        target: usize,
        tracks: usize,
    },
}

/// Read access to the ancestry of the tracks of one event.
///
/// The first [`primary_count`](AncestryProvider::primary_count) tracks are the primaries
/// produced by the generator; the remaining tracks are secondaries appended in the
/// order transport created them.
pub trait AncestryProvider {
    fn track(&self, index: usize) -> Option<&Particle>;
    fn track_count(&self) -> usize;
    fn primary_count(&self) -> usize;

    #[inline]
    fn is_primary(&self, index: usize) -> bool {
        index < self.primary_count()
    }

    #[inline]
    fn first_daughter(&self, index: usize) -> Option<usize> {
        self.track(index).and_then(|p| p.first_daughter)
    }
}

/// The kinematics tree of one event: every particle, primaries first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KinematicsStack {
    particles: Vec<Particle>,
    primaries: usize,
}

impl KinematicsStack {
    pub fn new(particles: Vec<Particle>, primaries: usize) -> Result<Self, StackError> {
        let tracks = particles.len();
        if primaries > tracks {
            return Err(StackError::TooManyPrimaries { primaries, tracks });
        }
        for (index, particle) in particles.iter().enumerate() {
            let links = [
                ("mother", particle.mother),
                ("first daughter", particle.first_daughter),
                ("last daughter", particle.last_daughter),
            ];
            for (link, target) in links {
                if let Some(target) = target.filter(|&t| t >= tracks) {
                    return Err(StackError::DanglingLink {
                        index,
                        link,
                        target,
                        tracks,
                    });
                }
            }
        }
        Ok(Self {
            particles,
            primaries,
        })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn secondaries(&self) -> &[Particle] {
        &self.particles[self.primaries..]
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

impl AncestryProvider for KinematicsStack {
    fn track(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    fn track_count(&self) -> usize {
        self.particles.len()
    }

    fn primary_count(&self) -> usize {
        self.primaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_with_one_decay() -> KinematicsStack {
        let particles = vec![
            Particle::new(211).with_daughters(2, 3),
            Particle::new(-211),
            Particle::new(22).with_mother(0),
            Particle::new(22).with_mother(0),
        ];
        KinematicsStack::new(particles, 2).unwrap()
    }

    #[test]
    fn counts_and_primary_flags_follow_the_primary_prefix() {
        let stack = stack_with_one_decay();
        assert_eq!(stack.track_count(), 4);
        assert_eq!(stack.primary_count(), 2);
        assert!(stack.is_primary(1));
        assert!(!stack.is_primary(2));
        assert_eq!(stack.secondaries().len(), 2);
        assert_eq!(stack.first_daughter(0), Some(2));
        assert_eq!(stack.first_daughter(1), None);
        assert_eq!(stack.first_daughter(17), None);
    }

    #[test]
    fn rejects_more_primaries_than_tracks() {
        let err = KinematicsStack::new(vec![Particle::new(11)], 2).unwrap_err();
        assert_eq!(
            err,
            StackError::TooManyPrimaries {
                primaries: 2,
                tracks: 1
            }
        );
    }

    #[test]
    fn rejects_links_pointing_outside_the_stack() {
        let particles = vec![Particle::new(11).with_daughters(1, 5), Particle::new(22)];
        let err = KinematicsStack::new(particles, 1).unwrap_err();
        assert!(matches!(
            err,
            StackError::DanglingLink {
                index: 0,
                link: "last daughter",
                target: 5,
                tracks: 2
            }
        ));
    }

    #[test]
    fn empty_stack_is_valid() {
        let stack = KinematicsStack::new(Vec::new(), 0).unwrap();
        assert!(stack.is_empty());
        assert_eq!(stack.track_count(), 0);
    }
}
