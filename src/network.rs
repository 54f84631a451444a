use crate::error::MalformedInputError;
use crate::{CarId, IntersectionId, StreetId, Time};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A one-way street between two intersections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Street {
    /// The street ID.
    id: StreetId,
    /// The unique name of the street.
    name: String,
    /// The intersection at the start of the street.
    start: IntersectionId,
    /// The intersection at the end of the street, which controls its light.
    end: IntersectionId,
    /// The time it takes to drive from one end of the street to the other.
    length: Time,
}

/// An intersection, which controls the lights of its incoming streets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Intersection {
    /// The intersection ID.
    id: IntersectionId,
    /// The streets ending here, in the order they were declared.
    incoming: SmallVec<[StreetId; 4]>,
    /// The streets starting here.
    outgoing: SmallVec<[StreetId; 4]>,
}

/// A car and the route it drives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Car {
    /// The car ID.
    id: CarId,
    /// The streets the car drives along, starting with the one it waits on.
    path: Vec<StreetId>,
}

/// An immutable road network: streets, intersections, cars and the scoring parameters.
#[derive(Clone, Debug)]
pub struct Network {
    /// The last time step of the simulation.
    duration: Time,
    /// The reward for each car which reaches its destination in time.
    bonus: u32,
    streets: Vec<Street>,
    intersections: Vec<Intersection>,
    cars: Vec<Car>,
    /// The intersection controlling the light at the end of each street.
    street_intersection: Vec<IntersectionId>,
    street_names: HashMap<String, StreetId>,
}

/// Incrementally assembles a [Network].
#[derive(Clone, Debug)]
pub struct NetworkBuilder {
    duration: Time,
    bonus: u32,
    streets: Vec<Street>,
    intersections: Vec<Intersection>,
    cars: Vec<Car>,
    street_names: HashMap<String, StreetId>,
}

impl Street {
    pub fn id(&self) -> StreetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> IntersectionId {
        self.start
    }

    pub fn end(&self) -> IntersectionId {
        self.end
    }

    /// Gets the time it takes to traverse the street.
    pub fn length(&self) -> Time {
        self.length
    }
}

impl Intersection {
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// Gets the streets whose lights this intersection controls, in declaration order.
    pub fn incoming(&self) -> &[StreetId] {
        &self.incoming
    }

    /// Gets the streets leaving this intersection.
    pub fn outgoing(&self) -> &[StreetId] {
        &self.outgoing
    }
}

impl Car {
    pub fn id(&self) -> CarId {
        self.id
    }

    /// Gets the car's route. The first street is the one the car starts queued on.
    pub fn path(&self) -> &[StreetId] {
        &self.path
    }
}

impl Network {
    /// Starts building a network with the given horizon, intersection count and per-car bonus.
    pub fn builder(duration: Time, num_intersections: usize, bonus: u32) -> NetworkBuilder {
        NetworkBuilder::new(duration, num_intersections, bonus)
    }

    /// Gets the last simulated time step (the horizon is inclusive).
    pub fn duration(&self) -> Time {
        self.duration
    }

    /// Gets the base reward granted to each car that arrives in time.
    pub fn bonus(&self) -> u32 {
        self.bonus
    }

    pub fn num_streets(&self) -> usize {
        self.streets.len()
    }

    pub fn num_intersections(&self) -> usize {
        self.intersections.len()
    }

    pub fn num_cars(&self) -> usize {
        self.cars.len()
    }

    /// Returns an iterator over all the streets, in ID order.
    pub fn streets(&self) -> impl ExactSizeIterator<Item = &Street> {
        self.streets.iter()
    }

    /// Returns an iterator over all the intersections, in ID order.
    pub fn intersections(&self) -> impl ExactSizeIterator<Item = &Intersection> {
        self.intersections.iter()
    }

    /// Returns an iterator over all the cars, in ID order.
    pub fn cars(&self) -> impl ExactSizeIterator<Item = &Car> {
        self.cars.iter()
    }

    /// Gets a reference to the street with the given ID.
    pub fn street(&self, id: StreetId) -> &Street {
        &self.streets[id.index()]
    }

    /// Gets a reference to the intersection with the given ID.
    pub fn intersection(&self, id: IntersectionId) -> &Intersection {
        &self.intersections[id.index()]
    }

    /// Gets a reference to the car with the given ID.
    pub fn car(&self, id: CarId) -> &Car {
        &self.cars[id.index()]
    }

    /// Looks up a street by name.
    pub fn street_by_name(&self, name: &str) -> Option<&Street> {
        self.street_names.get(name).map(|id| self.street(*id))
    }

    /// Gets the intersection controlling the light at the end of the street.
    #[inline]
    pub fn controlling_intersection(&self, street: StreetId) -> IntersectionId {
        self.street_intersection[street.index()]
    }
}

impl NetworkBuilder {
    /// Creates a builder for a network with intersections `0..num_intersections`.
    pub fn new(duration: Time, num_intersections: usize, bonus: u32) -> Self {
        Self {
            duration,
            bonus,
            streets: vec![],
            intersections: (0..num_intersections)
                .map(|idx| Intersection {
                    id: IntersectionId::new(idx as u32),
                    ..Default::default()
                })
                .collect(),
            cars: vec![],
            street_names: HashMap::new(),
        }
    }

    /// Adds a street running from `start` to `end`.
    pub fn add_street(
        &mut self,
        name: &str,
        start: u32,
        end: u32,
        length: Time,
    ) -> Result<StreetId, MalformedInputError> {
        if length == 0 {
            return Err(MalformedInputError::NonPositiveLength {
                name: name.to_owned(),
                length: 0,
            });
        }
        if self.street_names.contains_key(name) {
            return Err(MalformedInputError::DuplicateStreet(name.to_owned()));
        }
        let start = self.check_intersection(start)?;
        let end = self.check_intersection(end)?;

        let id = StreetId::new(self.streets.len() as u32);
        self.streets.push(Street {
            id,
            name: name.to_owned(),
            start,
            end,
            length,
        });
        self.street_names.insert(name.to_owned(), id);
        self.intersections[start.index()].outgoing.push(id);
        self.intersections[end.index()].incoming.push(id);
        Ok(id)
    }

    /// Adds a car which drives along the named streets.
    pub fn add_car<S: AsRef<str>>(&mut self, path: &[S]) -> Result<CarId, MalformedInputError> {
        let id = CarId::new(self.cars.len() as u32);
        if path.is_empty() {
            return Err(MalformedInputError::EmptyPath(id.index()));
        }
        let path = path
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.street_names
                    .get(name)
                    .copied()
                    .ok_or_else(|| MalformedInputError::UnknownStreet(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.cars.push(Car { id, path });
        Ok(id)
    }

    pub fn num_streets(&self) -> usize {
        self.streets.len()
    }

    pub fn num_cars(&self) -> usize {
        self.cars.len()
    }

    /// Finishes the network and builds the street to intersection lookup table.
    pub fn build(self) -> Network {
        let street_intersection = self.streets.iter().map(|street| street.end).collect();
        Network {
            duration: self.duration,
            bonus: self.bonus,
            streets: self.streets,
            intersections: self.intersections,
            cars: self.cars,
            street_intersection,
            street_names: self.street_names,
        }
    }

    fn check_intersection(&self, id: u32) -> Result<IntersectionId, MalformedInputError> {
        if (id as usize) < self.intersections.len() {
            Ok(IntersectionId::new(id))
        } else {
            Err(MalformedInputError::UnknownIntersection {
                id: id as i64,
                count: self.intersections.len(),
            })
        }
    }
}
